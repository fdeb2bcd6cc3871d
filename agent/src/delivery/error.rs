use reqwest::StatusCode;
use thiserror::Error;

/// Failure to hand a payload to the collector service
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to compress payload: {0}")]
    Compress(#[from] std::io::Error),
}

impl DeliveryError {
    /// Transport failures, 5xx and 429 may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Encode(_) | Self::Compress(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = DeliveryError::Status {
            status: StatusCode::BAD_REQUEST,
            body: "signature mismatch".into(),
        };
        assert_eq!(
            err.to_string(),
            "server responded 400 Bad Request: signature mismatch"
        );
    }

    #[test]
    fn test_is_transient() {
        let status = |status| DeliveryError::Status {
            status,
            body: String::new(),
        };
        assert!(status(StatusCode::INTERNAL_SERVER_ERROR).is_transient());
        assert!(status(StatusCode::SERVICE_UNAVAILABLE).is_transient());
        assert!(status(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!status(StatusCode::BAD_REQUEST).is_transient());
        assert!(!status(StatusCode::NOT_FOUND).is_transient());
        assert!(!DeliveryError::Compress(std::io::Error::other("disk")).is_transient());
    }
}
