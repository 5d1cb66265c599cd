use futures::StreamExt;
use thiserror::Error;

/// A body read stopped before completion.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The connection failed while streaming the body
    #[error("Failed to read response body: {0}")]
    Network(#[source] reqwest::Error),
    /// The body exceeded the caller's byte limit
    #[error("Response body too large")]
    TooLarge,
}

/// Read a response body, refusing anything larger than `limit` bytes.
///
/// Checks `Content-Length` up front, then enforces the limit while streaming
/// because the header can be absent or wrong.
pub async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, BodyError> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(BodyError::TooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BodyError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(BodyError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
