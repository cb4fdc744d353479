// SQS partial batch response builders
//
// Only the listed messages return to the queue; the rest of the batch is
// deleted.

use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse};

/// Report `message_id` as failed so SQS redelivers it.
pub(crate) fn report_failure(response: &mut SqsBatchResponse, message_id: impl Into<String>) {
    let mut failure = BatchItemFailure::default();
    failure.item_identifier = message_id.into();
    response.batch_item_failures.push(failure);
}
