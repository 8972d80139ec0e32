//! Error types shared across Reelcast crates.

use std::path::PathBuf;

/// Top-level error type for Reelcast operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("Timeline error: {message}")]
    Timeline { message: String },

    #[error("Asset error: {message}")]
    Asset { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Encoder error: {message}")]
    Encode { message: String },

    #[error("Playback error: {message}")]
    Playback { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using ReelError.
pub type ReelResult<T> = Result<T, ReelError>;

impl ReelError {
    pub fn timeline(msg: impl Into<String>) -> Self {
        Self::Timeline {
            message: msg.into(),
        }
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Human-readable reason suitable for a terminal "failed" notification.
    ///
    /// Encoder failures carry the encoder's own message without the category
    /// prefix so it reaches the caller verbatim.
    pub fn reason(&self) -> String {
        match self {
            Self::Encode { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this error means the runtime lacks a required capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_reason_is_verbatim() {
        let err = ReelError::encode("libvpx: invalid frame size");
        assert_eq!(err.reason(), "libvpx: invalid frame size");
        assert_eq!(err.to_string(), "Encoder error: libvpx: invalid frame size");
    }

    #[test]
    fn test_unsupported_flag() {
        assert!(ReelError::unsupported("no codec").is_unsupported());
        assert!(!ReelError::render("boom").is_unsupported());
    }
}
