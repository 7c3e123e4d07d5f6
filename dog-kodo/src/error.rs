use thiserror::Error;

/// Result type for storage operations
pub type KodoResult<T> = Result<T, KodoError>;

/// Errors that can occur while talking to the object store
#[derive(Error, Debug)]
pub enum KodoError {
    /// Network or timeout failure. Block writes retry these up to the configured bound.
    #[error("Transport error during {operation}: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// The store refused to assemble the uploaded blocks
    #[error("Finalize failed for {key}: {reason}")]
    Finalize { key: String, reason: String },

    /// Missing or unusable credentials or policy
    #[error("Signing error: {message}")]
    Signing { message: String },

    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// Insert-only policy rejected an overwrite
    #[error("Object already exists: {key}")]
    Conflict { key: String },

    /// Any other status the store answered with
    #[error("Remote error {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl From<std::convert::Infallible> for KodoError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

impl KodoError {
    /// Create a transport error for the named operation
    pub fn transport<E: std::fmt::Display>(operation: &'static str, error: E) -> Self {
        Self::Transport {
            operation,
            message: error.to_string(),
        }
    }

    /// Create a finalize error
    pub fn finalize<K: Into<String>, S: Into<String>>(key: K, reason: S) -> Self {
        Self::Finalize {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a signing error
    pub fn signing<S: Into<String>>(message: S) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(key: S) -> Self {
        Self::Conflict { key: key.into() }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Map a provider status code to an error.
    ///
    /// 404 and 612 mean the object is missing, 614 means it already exists.
    pub fn from_status<K: Into<String>, S: Into<String>>(status: u16, key: K, message: S) -> Self {
        match status {
            404 | 612 => Self::not_found(key),
            614 => Self::conflict(key),
            _ => Self::Remote {
                status,
                message: message.into(),
            },
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(KodoError::from_status(612, "a", "no such file"), KodoError::NotFound { .. }));
        assert!(matches!(KodoError::from_status(404, "a", ""), KodoError::NotFound { .. }));
        assert!(matches!(KodoError::from_status(614, "a", "file exists"), KodoError::Conflict { .. }));

        match KodoError::from_status(401, "a", "bad token") {
            KodoError::Remote { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
