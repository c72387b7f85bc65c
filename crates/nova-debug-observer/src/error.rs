use thiserror::Error;

pub type ObserverResult<T> = Result<T, ObserverError>;

/// Failures observed while processing a single session event.
///
/// None of these are fatal: the router logs them and keeps the state from
/// previous pause cycles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// The current stack frame has no usable source position or method name
    /// (native and synthetic frames).
    #[error("unresolved stack frame: {reason}")]
    UnresolvedFrame { reason: String },
    /// The host failed to compute the children of a frame.
    #[error("evaluation failed: {0}")]
    EvaluationFailure(String),
    #[error("observer inbox is closed")]
    InboxClosed,
}

impl ObserverError {
    pub(crate) fn unresolved(reason: impl Into<String>) -> Self {
        Self::UnresolvedFrame {
            reason: reason.into(),
        }
    }
}
