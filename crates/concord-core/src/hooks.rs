//! One-shot callbacks bound to the open transaction.
//!
//! [`TransactionHooks`] schedules a closure for one phase of the currently
//! open transaction. Every scheduled closure runs at most once and its
//! listener unregisters itself as soon as it fired or the transaction closed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::isolated::{DeadlockHandler, IsolatedProcedure};
use crate::listener::ClosureCommitListener;
use crate::manager::{ListenerId, ManagerInner, TransactionManager};
use crate::transaction::TransactionPhase;
use crate::{Error, Result};

type Callback = Box<dyn FnOnce() -> Result<()>>;

struct OneShot {
    manager: Weak<ManagerInner>,
    id: Cell<Option<ListenerId>>,
    callback: RefCell<Option<Callback>>,
}

impl OneShot {
    fn unregister(&self) {
        if let (Some(tm), Some(id)) = (TransactionManager::upgrade(&self.manager), self.id.take()) {
            tm.unregister_commit_listener(id);
        }
    }

    fn fire(&self) -> Result<()> {
        self.unregister();
        let callback = self.callback.borrow_mut().take();
        match callback {
            Some(callback) => callback(),
            None => Ok(()),
        }
    }
}

/// Schedules closures around the phases of the open transaction.
///
/// ```
/// use concord_core::{TransactionHooks, TransactionManager};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let tm = TransactionManager::new();
/// let hooks = TransactionHooks::new(&tm);
/// let flushed = Rc::new(Cell::new(false));
///
/// let tx = tm.create_transaction(false)?;
/// let flag = Rc::clone(&flushed);
/// hooks.post_commit(move || {
///     flag.set(true);
///     Ok(())
/// })?;
/// tx.commit()?;
/// assert!(flushed.get());
/// # Ok::<(), concord_core::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct TransactionHooks {
    tm: TransactionManager,
}

impl TransactionHooks {
    /// Creates hooks for the given manager.
    pub fn new(tm: &TransactionManager) -> Self {
        Self { tm: tm.clone() }
    }

    /// Returns true if a transaction is open.
    pub fn has_open_transaction(&self) -> bool {
        self.tm.has_open_transaction()
    }

    fn schedule(
        &self,
        disallowed: &[TransactionPhase],
        prioritize: bool,
        callback: impl FnOnce() -> Result<()> + 'static,
        attach: impl FnOnce(ClosureCommitListener, Rc<OneShot>) -> ClosureCommitListener,
    ) -> Result<()> {
        self.tm.ensure_transaction_open()?;

        let phase = self.tm.phase();
        if disallowed.contains(&phase) {
            return Err(Error::state(format!("Transaction is in {} phase.", phase)));
        }

        let shot = Rc::new(OneShot {
            manager: self.tm.downgrade(),
            id: Cell::new(None),
            callback: RefCell::new(Some(Box::new(callback))),
        });
        let cleanup = Rc::clone(&shot);
        let listener = attach(ClosureCommitListener::new(), Rc::clone(&shot)).with_finally(
            move |_| {
                cleanup.unregister();
                Ok(())
            },
        );

        let id = self.tm.register_commit_listener(Rc::new(listener), prioritize);
        shot.id.set(Some(id));
        Ok(())
    }

    /// Runs `callback` before the commit vote.
    pub fn pre_commit(&self, callback: impl FnOnce() -> Result<()> + 'static) -> Result<()> {
        self.schedule(&[], false, callback, |listener, shot| {
            listener.with_pre_commit(move |_| shot.fire())
        })
    }

    /// Runs `callback` after every resource committed.
    pub fn post_commit(&self, callback: impl FnOnce() -> Result<()> + 'static) -> Result<()> {
        self.schedule(&[], false, callback, |listener, shot| {
            listener.with_post_commit(move |_| shot.fire())
        })
    }

    /// Runs `callback` before the resources roll back.
    pub fn pre_rollback(&self, callback: impl FnOnce() -> Result<()> + 'static) -> Result<()> {
        self.schedule(&[], false, callback, |listener, shot| {
            listener.with_pre_rollback(move |_| shot.fire())
        })
    }

    /// Runs `callback` after the resources rolled back.
    pub fn post_rollback(&self, callback: impl FnOnce() -> Result<()> + 'static) -> Result<()> {
        self.schedule(&[], false, callback, |listener, shot| {
            listener.with_post_rollback(move |_| shot.fire())
        })
    }

    /// Runs `callback` before the first preparation pass.
    ///
    /// Fails once the transaction is completing.
    pub fn pre_prepare(&self, callback: impl FnOnce() -> Result<()> + 'static) -> Result<()> {
        self.schedule(
            &[
                TransactionPhase::PrepareCommit,
                TransactionPhase::Commit,
                TransactionPhase::Rollback,
            ],
            false,
            callback,
            |listener, shot| listener.with_pre_prepare(move |_| shot.fire()),
        )
    }

    /// Like [`Self::pre_prepare`], but while the transaction is completing the
    /// preparation gets extended and `callback` runs right away.
    pub fn pre_prepare_or_extend(
        &self,
        callback: impl FnOnce() -> Result<()> + 'static,
    ) -> Result<()> {
        if self.tm.phase().is_completing() {
            self.tm.extend_commit_preparation()?;
            return callback();
        }

        self.pre_prepare(callback)
    }

    /// Runs `callback` after a preparation pass.
    ///
    /// Without `extend` the callback waits for a pass that was not extended.
    /// With `extend` the listener is prioritized, extends the preparation and
    /// runs after the first pass. Callbacks of this kind therefore run before
    /// the non-extending ones.
    pub fn post_prepare(
        &self,
        callback: impl FnOnce() -> Result<()> + 'static,
        extend: bool,
    ) -> Result<()> {
        self.schedule(
            &[TransactionPhase::Commit, TransactionPhase::Rollback],
            extend,
            callback,
            move |listener, shot| {
                listener.with_post_prepare(move |tx| {
                    let tm = tx
                        .manager()
                        .ok_or_else(|| Error::state("Transaction manager no longer exists."))?;
                    if !extend && tm.is_commit_preparation_extended() {
                        return Ok(());
                    }
                    if extend {
                        tm.extend_commit_preparation()?;
                    }
                    shot.fire()
                })
            },
        )
    }

    /// Shorthand for [`Self::post_prepare`] with `extend`.
    pub fn post_prepare_and_extend(
        &self,
        callback: impl FnOnce() -> Result<()> + 'static,
    ) -> Result<()> {
        self.post_prepare(callback, true)
    }

    /// Runs `callback` if the manager enters the corrupted state.
    pub fn post_corrupted_state(
        &self,
        callback: impl FnOnce() -> Result<()> + 'static,
    ) -> Result<()> {
        self.schedule(&[], false, callback, |listener, shot| {
            listener.with_post_corrupted_state(move |_, _| shot.fire())
        })
    }

    /// Runs `callback` once the transaction closed.
    pub fn post_close(&self, callback: impl FnOnce() -> Result<()> + 'static) -> Result<()> {
        self.schedule(&[], false, callback, |listener, shot| {
            listener.with_post_close(move |_| shot.fire())
        })
    }

    /// Runs `callback` now if no transaction is open, otherwise once it closed.
    ///
    /// If the transaction ends in the corrupted state the callback only runs
    /// when `invoke_on_corrupted_state` is set.
    pub fn outside_transaction(
        &self,
        callback: impl FnOnce() -> Result<()> + 'static,
        invoke_on_corrupted_state: bool,
    ) -> Result<()> {
        if !self.tm.has_open_transaction() {
            return callback();
        }

        self.schedule(&[], false, callback, move |listener, shot| {
            listener.with_post_close(move |tx| {
                let corrupted = tx
                    .manager()
                    .map_or(false, |tm| tm.phase() == TransactionPhase::CorruptedState);
                if corrupted && !invoke_on_corrupted_state {
                    shot.unregister();
                    return Ok(());
                }
                shot.fire()
            })
        })
    }

    /// Runs `work` in an [`IsolatedProcedure`].
    pub fn exec_isolated<T>(
        &self,
        work: impl FnMut() -> Result<T>,
        tries: u32,
        deadlock_handler: Option<DeadlockHandler<T>>,
        read_only: bool,
    ) -> Result<T> {
        let mut procedure = IsolatedProcedure::new(&self.tm)
            .with_tries(tries)?
            .read_only(read_only);
        procedure.deadlock_handler = deadlock_handler;
        procedure.exec(work)
    }
}
