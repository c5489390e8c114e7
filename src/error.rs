use thiserror::Error;

/// Failure fetching or decoding a status page endpoint.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("unexpected response format: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Transport failures, timeouts, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request(e) => !e.is_builder(),
            FetchError::Timeout => true,
            FetchError::HttpStatus(code) => *code >= 500 || *code == 429,
            FetchError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("source not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Duplicate(String),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("hook timed out after {0}s")]
    Timeout(u64),

    #[error("hook exited with {0}")]
    ExitStatus(std::process::ExitStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(FetchError::HttpStatus(503).is_retryable());
        assert!(FetchError::HttpStatus(429).is_retryable());
        assert!(!FetchError::HttpStatus(404).is_retryable());
        assert!(FetchError::Timeout.is_retryable());
    }

    #[test]
    fn test_decode_not_retryable() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!FetchError::Decode(err).is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(FetchError::HttpStatus(502).to_string(), "HTTP 502");
        assert_eq!(RegistryError::NotFound.to_string(), "source not found");
    }
}
