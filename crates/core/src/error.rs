/// Result alias that carries the custom [`SyncError`] type.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// An external resource (audio context, device) could not be acquired.
    /// Surfaced to the caller of `start_game`; the session does not start.
    #[error("failed to initialise {resource}: {reason}")]
    ResourceInit {
        resource: &'static str,
        reason: String,
    },
    /// Transient failure while talking to the device.
    #[error("device send failed: {0}")]
    DeviceSend(#[from] DeviceError),
    /// A single media reference could not be resolved.
    #[error("could not resolve media `{reference}`: {reason}")]
    MediaResolution { reference: String, reason: String },
    /// Programmer error: a session field was missing where it is assumed present.
    #[error("state invariant violated: {0}")]
    StateInvariant(String),
    /// Configuration values outside their accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn resource_init(resource: &'static str, reason: impl Into<String>) -> Self {
        Self::ResourceInit {
            resource,
            reason: reason.into(),
        }
    }
}

impl From<&str> for SyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Errors raised by a [`DeviceAdapter`](crate::DeviceAdapter).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("device is not connected")]
    Disconnected,
    #[error("device rejected command: {0}")]
    Rejected(String),
    #[error("device state has been poisoned")]
    Poisoned,
}

/// Checks an internal invariant. Debug builds panic so the bug is found early;
/// release builds return [`SyncError::StateInvariant`] for the caller to absorb.
pub fn ensure_invariant(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        return Ok(());
    }

    let message = message.into();
    debug_assert!(condition, "state invariant violated: {message}");
    Err(SyncError::StateInvariant(message))
}
