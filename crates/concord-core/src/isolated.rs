//! Deadlock-retrying units of work.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::manager::TransactionManager;
use crate::{Error, Result};

/// Isolated procedure configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationConfig {
    /// Attempts before giving up on repeated deadlocks
    pub tries: u32,
    /// Open the transaction read only
    pub read_only: bool,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            tries: 3,
            read_only: false,
        }
    }
}

/// Fallback producing the result once every attempt deadlocked
pub type DeadlockHandler<T> = Box<dyn FnOnce() -> Result<T>>;

/// Runs a unit of work inside its own root transaction and retries it when
/// it ends in a deadlock.
///
/// # Examples
///
/// ```
/// use concord_core::{IsolatedProcedure, TransactionManager};
///
/// let tm = TransactionManager::new();
/// let answer = IsolatedProcedure::new(&tm)
///     .with_tries(5)?
///     .exec(|| Ok(42))?;
/// assert_eq!(answer, 42);
/// # Ok::<(), concord_core::Error>(())
/// ```
pub struct IsolatedProcedure<T> {
    tm: TransactionManager,
    tries: u32,
    read_only: bool,
    pub(crate) deadlock_handler: Option<DeadlockHandler<T>>,
}

impl<T> IsolatedProcedure<T> {
    /// Creates a procedure with the default configuration.
    pub fn new(tm: &TransactionManager) -> Self {
        let config = IsolationConfig::default();
        Self {
            tm: tm.clone(),
            tries: config.tries,
            read_only: config.read_only,
            deadlock_handler: None,
        }
    }

    /// Creates a procedure from a configuration.
    pub fn with_config(tm: &TransactionManager, config: IsolationConfig) -> Result<Self> {
        Ok(Self::new(tm)
            .with_tries(config.tries)?
            .read_only(config.read_only))
    }

    /// Number of attempts
    pub fn tries(&self) -> u32 {
        self.tries
    }

    /// Sets the number of attempts, at least 1.
    pub fn with_tries(mut self, tries: u32) -> Result<Self> {
        if tries < 1 {
            return Err(Error::InvalidOperation(format!(
                "Tries must be at least 1. Given: {}",
                tries
            )));
        }
        self.tries = tries;
        Ok(self)
    }

    /// Opens the transactions read only.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets the handler whose result is returned once every attempt deadlocked.
    pub fn with_deadlock_handler(mut self, handler: impl FnOnce() -> Result<T> + 'static) -> Self {
        self.deadlock_handler = Some(Box::new(handler));
        self
    }

    /// Runs `work` until it commits.
    ///
    /// Fails with a state error if a transaction is already open. Failures that
    /// are not deadlocks are returned as [`Error::ProcessFailed`] right away.
    pub fn exec(self, mut work: impl FnMut() -> Result<T>) -> Result<T> {
        if self.tm.has_open_transaction() {
            return Err(Error::state(
                "IsolatedProcedure must not be executed inside an already open transaction so it \
                 can create and possibly recreate a root transaction.",
            ));
        }

        let mut attempt = 1;
        loop {
            let err = match self.attempt(&mut work) {
                Ok(value) => {
                    debug!(attempt, "isolated procedure committed");
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !err.is_deadlock() {
                return Err(Error::ProcessFailed {
                    message: format!("Isolated procedure failed on attempt {}.", attempt),
                    source: Box::new(err),
                });
            }

            if attempt >= self.tries {
                warn!(tries = self.tries, "isolated procedure exhausted its deadlock retries");
                return match self.deadlock_handler {
                    Some(handler) => handler(),
                    None => Err(Error::ProcessFailed {
                        message: format!(
                            "Process failed after {} deadlock attempts.",
                            self.tries
                        ),
                        source: Box::new(err),
                    }),
                };
            }

            warn!(attempt, tries = self.tries, error = %err, "deadlock, retrying isolated procedure");
            attempt += 1;
        }
    }

    fn attempt(&self, work: &mut impl FnMut() -> Result<T>) -> Result<T> {
        let transaction = self.tm.create_transaction(self.read_only)?;
        let result = work().and_then(|value| transaction.commit().map(|()| value));

        // the commit may have been interrupted, leaving the transaction open
        if result.is_err() && self.tm.has_open_transaction() {
            match transaction.roll_back() {
                Err(e @ Error::CorruptedState { .. }) => return Err(e),
                Err(e) => warn!(error = %e, "rollback of failed attempt reported an error"),
                Ok(()) => {}
            }
        }

        result
    }
}
