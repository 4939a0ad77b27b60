use futures::StreamExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("Response too large (exceeds {0} bytes)")]
    TooLarge(usize),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Read a response body, giving up as soon as it exceeds `limit` bytes.
///
/// A `Content-Length` above the limit fails before any body is read; the
/// streamed byte count is checked too since the header can lie.
pub async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, BodyError> {
    if let Some(len) = response.content_length() {
        if usize::try_from(len).unwrap_or(usize::MAX) > limit {
            return Err(BodyError::TooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(BodyError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
