use tracing::debug;

use crate::memory::log_memory;
use crate::{Result, StorageContext, WriterError};

/// Write `bytes` to `key`, replacing any existing object.
///
/// Backends that support multi-part writes receive the object in
/// `upload_chunk_bytes` parts; others get a single put.
pub async fn upload_object(ctx: &StorageContext, key: &str, bytes: Vec<u8>) -> Result<()> {
    let operator = ctx.operator();
    let len = bytes.len();
    let chunk = ctx.upload_chunk_bytes();
    let multipart = operator.info().full_capability().write_can_multi && len > chunk;

    let written = if multipart {
        operator.write_with(key, bytes).chunk(chunk).await
    } else {
        operator.write(key, bytes).await
    };
    written.map_err(|e| WriterError::upload(key, e))?;

    debug!(key, bytes = len, multipart, "object uploaded");
    log_memory("uploaded object");
    Ok(())
}
