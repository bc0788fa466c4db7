//! # Messaging Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessagingError {
    #[error("Network timeout: operation {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Send to queue {queue_name} failed: {message}")]
    SendFailed { queue_name: String, message: String },

    #[error("Message serialization error: {message}")]
    Serialization { message: String },

    #[error("Queue setup failed: {queue_name}: {message}")]
    QueueSetup { queue_name: String, message: String },
}

impl MessagingError {
    /// Whether another send may succeed where this one failed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::SendFailed { .. })
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(MessagingError::Timeout {
            operation: "send".into(),
            timeout_ms: 5000
        }
        .is_transient());
        assert!(MessagingError::SendFailed {
            queue_name: "q".into(),
            message: "connection reset".into()
        }
        .is_transient());
        assert!(!MessagingError::Serialization {
            message: "bad".into()
        }
        .is_transient());
    }

    #[test]
    fn test_timeout_display() {
        let err = MessagingError::Timeout {
            operation: "send".into(),
            timeout_ms: 5000,
        };
        assert_eq!(
            err.to_string(),
            "Network timeout: operation send timed out after 5000ms"
        );
    }
}
