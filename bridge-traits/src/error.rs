use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure happened before a response arrived and is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout(_) | BridgeError::Connection(_) | BridgeError::OperationFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failure of a single listing or payload request, after classification.
///
/// `Transient` failures are eligible for retry. `Exhausted` is a transient failure
/// that ran out of attempts; it is treated as fatal for that one request only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transient fetch failure (status {status:?}): {message}")]
    Transient { status: Option<u16>, message: String },

    #[error("fatal fetch failure (status {status:?}): {message}")]
    Fatal { status: Option<u16>, message: String },

    #[error("gave up after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        FetchError::Transient {
            status: None,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        FetchError::Fatal {
            status: None,
            message: message.into(),
        }
    }

    /// Classify an HTTP status. Timeouts never reach here; they are transient
    /// transport errors.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 || (500..600).contains(&status) {
            FetchError::Transient {
                status: Some(status),
                message,
            }
        } else {
            FetchError::Fatal {
                status: Some(status),
                message,
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    /// The item may still succeed on a later run.
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            FetchError::Transient { .. } | FetchError::Exhausted { .. }
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Transient { status, .. } | FetchError::Fatal { status, .. } => *status,
            FetchError::Exhausted { .. } => None,
        }
    }
}

impl From<BridgeError> for FetchError {
    fn from(err: BridgeError) -> Self {
        if err.is_transient() {
            FetchError::transient(err.to_string())
        } else {
            FetchError::fatal(err.to_string())
        }
    }
}
