/// Result alias that carries the custom [`MocapError`] type.
pub type Result<T> = std::result::Result<T, MocapError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MocapError {
    /// A raw frame had the wrong shape, length, or a non-numeric coordinate.
    #[error("malformed frame {frame}: {reason}")]
    MalformedFrame { frame: usize, reason: String },
    /// The fixed joint table failed validation. Indicates a programming error.
    #[error("invalid skeleton specification: {0}")]
    InvalidSkeletonSpec(String),
    /// A channel vector did not match the arity fixed by earlier frames.
    #[error("channel arity mismatch at frame {frame}: expected {expected}, found {found}")]
    ChannelArityMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
    /// Nothing to convert.
    #[error("no frames to convert")]
    EmptyInput,
    #[error("frame rate must be finite and positive, got {0}")]
    InvalidFrameRate(f64),
    /// Free-form error, used by the parsers and the command line.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl MocapError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn malformed<T: Into<String>>(frame: usize, reason: T) -> Self {
        Self::MalformedFrame {
            frame,
            reason: reason.into(),
        }
    }
}

impl From<&str> for MocapError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MocapError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
