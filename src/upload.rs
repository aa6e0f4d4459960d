//! Receiving a single uploaded file and persisting it.
//!
//! Validation happens in a fixed order and the first failure is reported:
//! missing `file` field, empty filename, unusable filename, disallowed
//! extension, oversized payload. The body is streamed chunk by chunk into an
//! incoming file and only published once it has been written completely.

use crate::{config::UploadConfig, sanitize::sanitize, storage::Storage};
use axum::extract::multipart::{Field, Multipart, MultipartError};
use bytes::Bytes;
use std::{future::Future, io};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, error, info, warn};

/// Name of the multipart form field carrying the file.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file part in request.")]
    MissingFilePart,
    #[error("No file selected.")]
    NoFileSelected,
    #[error("Invalid filename.")]
    InvalidFilename,
    #[error("File type not allowed.")]
    ExtensionNotAllowed,
    #[error("File is too large (limit is {limit} bytes).")]
    PayloadTooLarge { limit: u64 },
    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Could not store file.")]
    Storage(#[from] io::Error),
}

/// Something an upload body can be pulled from, one chunk at a time.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, UploadError>> + Send;
}

impl ChunkSource for Field<'_> {
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, UploadError>> + Send {
        async move { Ok(self.chunk().await?) }
    }
}

/// The file part of an upload request: the client's name hint and its body.
pub struct FilePart<S> {
    pub file_name: Option<String>,
    pub body: S,
}

/// Finds the `file` field of a multipart request and stores it.
///
/// `declared_len` is the request's `Content-Length`, when the client sent one.
pub async fn receive(
    storage: &Storage,
    config: &UploadConfig,
    declared_len: Option<u64>,
    multipart: &mut Multipart,
) -> Result<String, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            debug!("Ignoring form field {:?}", field.name());
            continue;
        }
        let part = FilePart {
            file_name: field.file_name().map(str::to_owned),
            body: field,
        };
        return accept(storage, config, declared_len, part).await;
    }
    Err(UploadError::MissingFilePart)
}

/// Validates a file part and writes it to storage, returning the stored name.
pub async fn accept<S: ChunkSource>(
    storage: &Storage,
    config: &UploadConfig,
    declared_len: Option<u64>,
    part: FilePart<S>,
) -> Result<String, UploadError> {
    let FilePart { file_name, mut body } = part;

    let raw_name = file_name
        .filter(|name| !name.is_empty())
        .ok_or(UploadError::NoFileSelected)?;

    let name = sanitize(&raw_name).ok_or_else(|| {
        warn!("Rejected invalid filename: {:?}", raw_name);
        UploadError::InvalidFilename
    })?;

    if !config.allows(&name) {
        warn!("Rejected disallowed file type: {}", name);
        return Err(UploadError::ExtensionNotAllowed);
    }

    let limit = config.max_upload_size;
    if let Some(len) = declared_len.filter(|len| *len > limit) {
        warn!(
            "Rejected upload of '{}': declared {} bytes, limit {}",
            name, len, limit
        );
        return Err(UploadError::PayloadTooLarge { limit });
    }

    // Dropping `incoming` deletes the file, including when this future is
    // cancelled mid-stream.
    let (file, incoming) = storage.create_incoming()?;
    let written = match write_incoming(file, &mut body, limit).await {
        Ok(written) => written,
        Err(e) => {
            warn!("Upload of '{}' failed: {}", name, e);
            return Err(e);
        }
    };

    let stored = storage.publish(incoming, &name).await.map_err(|e| {
        error!("Failed to publish upload '{}': {}", name, e);
        UploadError::Storage(e)
    })?;
    info!("Uploaded '{}' as '{}' ({} bytes)", raw_name, stored, written);
    Ok(stored)
}

/// Streams `body` into `file`, failing once more than `limit` bytes have
/// arrived. Returns the number of bytes written.
async fn write_incoming<S: ChunkSource>(
    mut file: fs::File,
    body: &mut S,
    limit: u64,
) -> Result<u64, UploadError> {
    let mut total = 0u64;

    while let Some(chunk) = body.next_chunk().await? {
        total = total.saturating_add(chunk.len() as u64);
        if total > limit {
            return Err(UploadError::PayloadTooLarge { limit });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(total)
}
