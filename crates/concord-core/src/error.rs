//! Error types for Concord.

use thiserror::Error;

/// The main error type for Concord operations.
///
/// Participants (resources, listeners, units of work) report failures with
/// [`Error::resource`], [`Error::deadlock`] or [`Error::interrupt`]. The
/// manager wraps them into the phase-specific variants below so callers can
/// tell an intentional rollback from an unexpected one and a recoverable
/// failure from a corrupted state.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted in a phase where it is not legal
    #[error("Transaction state error: {0}")]
    TransactionState(String),

    /// Invalid argument or operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Failure raised by a participant
    #[error("Resource error: {message}")]
    Resource {
        /// Failure description
        message: String,
        /// Whether the failure was caused by a deadlock and may be retried
        deadlock: bool,
    },

    /// A participant asked to abort the running commit but keep the transaction open
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// A resource failed to begin the transaction
    #[error("Transaction begin failed: {source}")]
    BeginFailed {
        /// Cause
        #[source]
        source: Box<Error>,
    },

    /// Commit preparation or the commit vote failed
    #[error("Commit preparation failed: {message}")]
    CommitPreparationFailed {
        /// Failure description
        message: String,
        /// Whether the failure was caused by a deadlock
        deadlock: bool,
        /// Cause
        #[source]
        source: Box<Error>,
    },

    /// A resource failed to apply the commit
    #[error("Transaction commit failed: {source}")]
    CommitFailed {
        /// Cause
        #[source]
        source: Box<Error>,
    },

    /// A resource failed to roll back
    #[error("Transaction rollback failed: {source}")]
    RollbackFailed {
        /// Cause
        #[source]
        source: Box<Error>,
    },

    /// A listener interrupted a phase before its point of no return
    #[error("Callback {callback} caused error: {source}")]
    PreInterrupted {
        /// Name of the failing callback
        callback: &'static str,
        /// Cause
        #[source]
        source: Box<Error>,
    },

    /// A listener failed after the point of no return
    #[error("Callback {callback} caused error: {source}")]
    PostInterrupted {
        /// Name of the failing callback
        callback: &'static str,
        /// Cause
        #[source]
        source: Box<Error>,
    },

    /// A commit was requested but the transaction was rolled back instead
    #[error("{message}: {source}")]
    UnexpectedRollback {
        /// Failure description
        message: String,
        /// Cause
        #[source]
        source: Box<Error>,
    },

    /// The manager entered the corrupted state
    #[error("TransactionManager state could be corrupted. Reason: {reason}")]
    CorruptedState {
        /// Why the state was corrupted
        reason: String,
        /// Cause
        #[source]
        source: Box<Error>,
    },

    /// An isolated procedure gave up
    #[error("{message}")]
    ProcessFailed {
        /// Failure description
        message: String,
        /// Cause
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Creates a participant failure.
    pub fn resource(message: impl Into<String>) -> Self {
        Error::Resource {
            message: message.into(),
            deadlock: false,
        }
    }

    /// Creates a participant failure flagged as deadlock.
    pub fn deadlock(message: impl Into<String>) -> Self {
        Error::Resource {
            message: message.into(),
            deadlock: true,
        }
    }

    /// Creates an interruption that keeps the transaction open.
    pub fn interrupt(message: impl Into<String>) -> Self {
        Error::Interrupted(message.into())
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Error::TransactionState(message.into())
    }

    /// Returns true if this failure, or the failure it wraps, was caused by a deadlock.
    pub fn is_deadlock(&self) -> bool {
        match self {
            Error::Resource { deadlock, .. } => *deadlock,
            Error::CommitPreparationFailed { deadlock, .. } => *deadlock,
            Error::BeginFailed { source }
            | Error::PreInterrupted { source, .. }
            | Error::UnexpectedRollback { source, .. } => source.is_deadlock(),
            _ => false,
        }
    }

    /// Returns true for state violations, including the corrupted state.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Error::TransactionState(_) | Error::CorruptedState { .. }
        )
    }
}

/// A specialized `Result` type for Concord operations.
pub type Result<T> = std::result::Result<T, Error>;
