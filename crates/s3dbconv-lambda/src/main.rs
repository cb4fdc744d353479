// AWS Lambda binary entry point
//
// Build with: cargo build --release -p s3dbconv-lambda
//
// The lambda_runtime crate provides the tokio runtime, so we use #[tokio::main]

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    s3dbconv_lambda::run().await
}
