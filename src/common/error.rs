//! Errors raised by the CGI adapter.
//!
//! Handlers built on top of the adapter use `anyhow`. These are the
//! adapter's own failure kinds, which the dispatcher maps to HTTP statuses.
//
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CgiError {
    /// CONTENT_LENGTH present but not a non-negative integer.
    /// The parser recovers from this by using 0.
    #[error("Malformed CONTENT_LENGTH: {0:?}")]
    MalformedContentLength(String),
    /// Input stream ended before the declared body length was read.
    #[error("Incomplete request body: expected {expected} bytes, received {received}")]
    IncompleteBody { expected: usize, received: usize },
    /// Header mutation after the header block went out.
    #[error("HTTP headers already sent")]
    HeadersAlreadySent,
    /// Body or header block emitted without a Content-Type header.
    #[error("Response has no Content-Type header")]
    MissingContentType,
    /// CR or LF inside a header name or value.
    #[error("Invalid response header: {0:?}")]
    InvalidHeader(String),
    /// Handler does not accept this method. Never raised by the parser.
    #[error("Request method {0:?} not supported")]
    UnsupportedMethod(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CgiError {
    /// HTTP status used when this error reaches the dispatcher.
    pub fn status(&self) -> u16 {
        match self {
            CgiError::MalformedContentLength(_) | CgiError::IncompleteBody { .. } => 400,
            CgiError::UnsupportedMethod(_) => 405,
            _ => 500,
        }
    }
}

#[test]
fn error_status_mapping() {
    assert_eq!(CgiError::IncompleteBody { expected: 10, received: 3 }.status(), 400);
    assert_eq!(CgiError::UnsupportedMethod("PUT".to_string()).status(), 405);
    assert_eq!(CgiError::HeadersAlreadySent.status(), 500);
    let msg = CgiError::IncompleteBody { expected: 10, received: 3 }.to_string();
    assert_eq!(msg, "Incomplete request body: expected 10 bytes, received 3");
}
