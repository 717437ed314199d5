//! Commit listeners observing phase transitions.

use crate::transaction::Transaction;
use crate::{Error, Result};

/// Observer invoked around every phase of the protocol.
///
/// All hooks default to no-ops. Failures of `pre_prepare`, `post_prepare` and
/// `pre_commit` interrupt the commit and reopen the transaction. Failures of
/// the remaining hooks are recorded, the other listeners are still notified,
/// and the first failure is returned to the caller afterwards.
pub trait CommitListener {
    /// Before the first preparation pass
    fn pre_prepare(&self, _transaction: &Transaction) -> Result<()> {
        Ok(())
    }

    /// After every preparation pass
    fn post_prepare(&self, _transaction: &Transaction) -> Result<()> {
        Ok(())
    }

    /// Before the commit vote
    fn pre_commit(&self, _transaction: &Transaction) -> Result<()> {
        Ok(())
    }

    /// After every resource committed
    fn post_commit(&self, _transaction: &Transaction) -> Result<()> {
        Ok(())
    }

    /// Before resources roll back
    fn pre_rollback(&self, _transaction: &Transaction) -> Result<()> {
        Ok(())
    }

    /// After resources rolled back
    fn post_rollback(&self, _transaction: &Transaction) -> Result<()> {
        Ok(())
    }

    /// Once per transaction lifecycle, also after a corruption
    fn post_close(&self, _transaction: &Transaction) -> Result<()> {
        Ok(())
    }

    /// When the manager entered the corrupted state
    fn post_corrupted_state(&self, _transaction: Option<&Transaction>, _error: &Error) -> Result<()> {
        Ok(())
    }
}

type TransactionCallback = Box<dyn Fn(&Transaction) -> Result<()>>;
type CorruptedStateCallback = Box<dyn Fn(Option<&Transaction>, &Error) -> Result<()>>;

/// A [`CommitListener`] assembled from optional callbacks.
///
/// ```
/// use concord_core::{ClosureCommitListener, TransactionManager};
/// use std::rc::Rc;
///
/// let tm = TransactionManager::new();
/// let listener = ClosureCommitListener::new().with_post_commit(|tx| {
///     println!("committed at level {}", tx.level());
///     Ok(())
/// });
/// tm.register_commit_listener(Rc::new(listener), false);
/// ```
#[derive(Default)]
pub struct ClosureCommitListener {
    pre_prepare: Option<TransactionCallback>,
    post_prepare: Option<TransactionCallback>,
    pre_commit: Option<TransactionCallback>,
    post_commit: Option<TransactionCallback>,
    pre_rollback: Option<TransactionCallback>,
    post_rollback: Option<TransactionCallback>,
    post_close: Option<TransactionCallback>,
    post_corrupted_state: Option<CorruptedStateCallback>,
    finally: Option<TransactionCallback>,
}

impl ClosureCommitListener {
    /// Creates a listener without callbacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `pre_prepare` callback
    pub fn with_pre_prepare(mut self, f: impl Fn(&Transaction) -> Result<()> + 'static) -> Self {
        self.pre_prepare = Some(Box::new(f));
        self
    }

    /// Sets the `post_prepare` callback
    pub fn with_post_prepare(mut self, f: impl Fn(&Transaction) -> Result<()> + 'static) -> Self {
        self.post_prepare = Some(Box::new(f));
        self
    }

    /// Sets the `pre_commit` callback
    pub fn with_pre_commit(mut self, f: impl Fn(&Transaction) -> Result<()> + 'static) -> Self {
        self.pre_commit = Some(Box::new(f));
        self
    }

    /// Sets the `post_commit` callback
    pub fn with_post_commit(mut self, f: impl Fn(&Transaction) -> Result<()> + 'static) -> Self {
        self.post_commit = Some(Box::new(f));
        self
    }

    /// Sets the `pre_rollback` callback
    pub fn with_pre_rollback(mut self, f: impl Fn(&Transaction) -> Result<()> + 'static) -> Self {
        self.pre_rollback = Some(Box::new(f));
        self
    }

    /// Sets the `post_rollback` callback
    pub fn with_post_rollback(mut self, f: impl Fn(&Transaction) -> Result<()> + 'static) -> Self {
        self.post_rollback = Some(Box::new(f));
        self
    }

    /// Sets the `post_close` callback
    pub fn with_post_close(mut self, f: impl Fn(&Transaction) -> Result<()> + 'static) -> Self {
        self.post_close = Some(Box::new(f));
        self
    }

    /// Sets the `post_corrupted_state` callback
    pub fn with_post_corrupted_state(
        mut self,
        f: impl Fn(Option<&Transaction>, &Error) -> Result<()> + 'static,
    ) -> Self {
        self.post_corrupted_state = Some(Box::new(f));
        self
    }

    /// Sets a callback that runs after `post_close`, whatever the outcome.
    pub fn with_finally(mut self, f: impl Fn(&Transaction) -> Result<()> + 'static) -> Self {
        self.finally = Some(Box::new(f));
        self
    }
}

fn call(callback: &Option<TransactionCallback>, transaction: &Transaction) -> Result<()> {
    match callback {
        Some(f) => f(transaction),
        None => Ok(()),
    }
}

impl CommitListener for ClosureCommitListener {
    fn pre_prepare(&self, transaction: &Transaction) -> Result<()> {
        call(&self.pre_prepare, transaction)
    }

    fn post_prepare(&self, transaction: &Transaction) -> Result<()> {
        call(&self.post_prepare, transaction)
    }

    fn pre_commit(&self, transaction: &Transaction) -> Result<()> {
        call(&self.pre_commit, transaction)
    }

    fn post_commit(&self, transaction: &Transaction) -> Result<()> {
        call(&self.post_commit, transaction)
    }

    fn pre_rollback(&self, transaction: &Transaction) -> Result<()> {
        call(&self.pre_rollback, transaction)
    }

    fn post_rollback(&self, transaction: &Transaction) -> Result<()> {
        call(&self.post_rollback, transaction)
    }

    fn post_close(&self, transaction: &Transaction) -> Result<()> {
        let result = call(&self.post_close, transaction);
        let finally = call(&self.finally, transaction);
        result.and(finally)
    }

    fn post_corrupted_state(&self, transaction: Option<&Transaction>, error: &Error) -> Result<()> {
        match &self.post_corrupted_state {
            Some(f) => f(transaction, error),
            None => Ok(()),
        }
    }
}
