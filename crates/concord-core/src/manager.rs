//! The transaction manager.
//!
//! [`TransactionManager`] owns the phase state machine, the resource and
//! listener registries, and drives the coordinated protocol:
//!
//! ```text
//! Closed -> Open -> PrepareCommit -> Commit -> Closed
//!           Open -> PrepareCommit/Open -> Rollback -> Closed
//!           Commit | Rollback -> CorruptedState (absorbing)
//! ```
//!
//! The manager is meant for exactly one execution context. It is a cheap
//! clonable handle over shared state, it is not `Send`, and it never holds a
//! borrow of that state while calling into resources or listeners, so any
//! participant may call back into it.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, error, warn};

use crate::listener::CommitListener;
use crate::resource::{ReleasableResource, TransactionalResource};
use crate::transaction::{Transaction, TransactionPhase};
use crate::{Error, Result};

const SUB_ROLLED_BACK: &str =
    "Transaction cannot be committed because sub transaction was rolled back";

/// Handle of a registered resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

/// Handle of a registered commit listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Clone)]
enum Releasable {
    Transactional(Rc<dyn TransactionalResource>),
    Plain(Rc<dyn ReleasableResource>),
}

impl Releasable {
    fn release(&self) -> Result<()> {
        match self {
            Releasable::Transactional(resource) => resource.release(),
            Releasable::Plain(resource) => resource.release(),
        }
    }
}

/// How a failed completion step gets resolved
enum Failure {
    /// Back to `Open`, the caller may retry or roll back
    Reopen(Error),
    /// Automatic rollback, surfaced as an unexpected rollback
    RollBack(Error),
    /// Nothing can be assumed about the resources anymore
    Corrupt(&'static str, Error),
}

struct State {
    phase: TransactionPhase,
    t_ref: u64,
    next_id: u64,
    transactional_resources: Vec<(ResourceId, Rc<dyn TransactionalResource>)>,
    releasable_resources: Vec<(ResourceId, Releasable)>,
    begun_resources: Vec<ResourceId>,
    commit_listeners: Vec<(ListenerId, Rc<dyn CommitListener>)>,
    root_transaction: Option<Transaction>,
    current_level: usize,
    transactions: BTreeMap<usize, Transaction>,
    read_only: Option<bool>,
    rolling_back: bool,
    commit_preparation_extended: bool,
    commit_preparations_num: u32,
    pending_commit_preparations: Option<VecDeque<ResourceId>>,
}

impl State {
    fn new() -> Self {
        Self {
            phase: TransactionPhase::Closed,
            t_ref: 1,
            next_id: 1,
            transactional_resources: Vec::new(),
            releasable_resources: Vec::new(),
            begun_resources: Vec::new(),
            commit_listeners: Vec::new(),
            root_transaction: None,
            current_level: 0,
            transactions: BTreeMap::new(),
            read_only: None,
            rolling_back: false,
            commit_preparation_extended: false,
            commit_preparations_num: 0,
            pending_commit_preparations: None,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn resource(&self, id: ResourceId) -> Option<Rc<dyn TransactionalResource>> {
        self.transactional_resources
            .iter()
            .find(|(rid, _)| *rid == id)
            .map(|(_, resource)| Rc::clone(resource))
    }

    fn clear_preparation(&mut self) {
        self.commit_preparation_extended = false;
        self.commit_preparations_num = 0;
        self.pending_commit_preparations = None;
    }

    /// Forgets the transaction, keeping the phase.
    fn clear_transaction(&mut self) {
        self.transactions.clear();
        self.current_level = 0;
        self.read_only = None;
        self.rolling_back = false;
        self.begun_resources.clear();
        self.clear_preparation();
        self.t_ref += 1;
    }

    fn reset(&mut self) {
        self.root_transaction = None;
        self.clear_transaction();
        self.phase = TransactionPhase::Closed;
    }
}

pub(crate) struct ManagerInner {
    state: RefCell<State>,
}

/// Coordinates registered resources through begin, prepare, commit and rollback.
///
/// # Examples
///
/// ```
/// use concord_core::TransactionManager;
///
/// let tm = TransactionManager::new();
/// let tx = tm.create_transaction(false)?;
/// let nested = tm.create_transaction(false)?;
/// nested.commit()?;
/// assert!(tm.has_open_transaction());
/// tx.commit()?;
/// assert!(!tm.has_open_transaction());
/// # Ok::<(), concord_core::Error>(())
/// ```
#[derive(Clone)]
pub struct TransactionManager {
    inner: Rc<ManagerInner>,
}

impl TransactionManager {
    /// Creates a manager without resources or listeners.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ManagerInner {
                state: RefCell::new(State::new()),
            }),
        }
    }

    pub(crate) fn upgrade(inner: &Weak<ManagerInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<ManagerInner> {
        Rc::downgrade(&self.inner)
    }

    fn state(&self) -> Ref<'_, State> {
        self.inner.state.borrow()
    }

    fn state_mut(&self) -> RefMut<'_, State> {
        self.inner.state.borrow_mut()
    }

    /// Opens a transaction level.
    ///
    /// The first level is the root transaction: it fixes the read-only mode
    /// and begins the transaction on every registered resource. If a resource
    /// fails to begin, the resources that already began are rolled back and an
    /// [`Error::UnexpectedRollback`] is returned.
    pub fn create_transaction(&self, read_only: bool) -> Result<Transaction> {
        let transaction = {
            let mut guard = self.state_mut();
            let state = &mut *guard;

            if !matches!(state.phase, TransactionPhase::Closed | TransactionPhase::Open) {
                return Err(Error::state(format!(
                    "Can not create transaction in {} phase.",
                    state.phase
                )));
            }

            if state.read_only == Some(true) && !read_only {
                return Err(Error::state(
                    "Cannot create non read only transaction in read only transaction.",
                ));
            }

            state.current_level += 1;
            let transaction = Transaction::new(
                self.downgrade(),
                state.next_id(),
                state.current_level,
                state.t_ref,
                read_only,
            );
            state
                .transactions
                .insert(state.current_level, transaction.clone());

            if state.current_level == 1 {
                state.read_only = Some(read_only);
                state.root_transaction = Some(transaction.clone());
                state.phase = TransactionPhase::Open;
            }

            transaction
        };

        debug!(
            level = transaction.level(),
            t_ref = transaction.t_ref(),
            read_only,
            "transaction created"
        );

        if transaction.is_root() {
            self.begin(&transaction)?;
        }

        Ok(transaction)
    }

    fn begin(&self, transaction: &Transaction) -> Result<()> {
        let resources: Vec<_> = self
            .state()
            .transactional_resources
            .iter()
            .map(|(id, resource)| (*id, Rc::clone(resource)))
            .collect();

        for (id, resource) in resources {
            if self.state().resource(id).is_none() {
                continue;
            }

            if let Err(e) = resource.begin_transaction(transaction) {
                let cause = Error::BeginFailed {
                    source: Box::new(e),
                };
                warn!(error = %cause, "transaction begin failed, rolling back");
                self.unexpectedly_roll_back(transaction, &cause)?;
                return Err(Error::UnexpectedRollback {
                    message: "Failure in transaction begin phase caused an unexpected rollback"
                        .to_string(),
                    source: Box::new(cause),
                });
            }

            self.state_mut().begun_resources.push(id);
        }

        Ok(())
    }

    /// Returns true if a transaction is open.
    pub fn has_open_transaction(&self) -> bool {
        self.state().root_transaction.is_some()
    }

    /// Current phase of the state machine
    pub fn phase(&self) -> TransactionPhase {
        self.state().phase
    }

    /// Read-only mode of the open transaction, `None` if no transaction is open.
    pub fn is_read_only(&self) -> Option<bool> {
        self.state().read_only
    }

    /// Current nesting depth, 0 when closed
    pub fn current_level(&self) -> usize {
        self.state().current_level
    }

    /// Fails with a state error unless a transaction is open.
    pub fn ensure_transaction_open(&self) -> Result<()> {
        if self.has_open_transaction() {
            Ok(())
        } else {
            Err(Error::state("No active transaction."))
        }
    }

    fn ensure_no_transaction_open(&self) -> Result<()> {
        if self.has_open_transaction() {
            Err(Error::state("Transaction open."))
        } else {
            Ok(())
        }
    }

    /// The root transaction
    pub fn root_transaction(&self) -> Result<Transaction> {
        self.state()
            .root_transaction
            .clone()
            .ok_or_else(|| Error::state("No active transaction."))
    }

    /// The innermost open transaction level
    pub fn current_transaction(&self) -> Result<Transaction> {
        let state = self.state();
        state
            .transactions
            .values()
            .next_back()
            .or(state.root_transaction.as_ref())
            .cloned()
            .ok_or_else(|| Error::state("No active transaction."))
    }

    pub(crate) fn close_level(&self, id: u64, level: usize, t_ref: u64, commit: bool) -> Result<()> {
        let (root, rolling_back) = {
            let mut state = self.state_mut();

            // a reused level holds a different handle
            let open = state.transactions.get(&level).map(Transaction::id) == Some(id);
            if state.t_ref != t_ref || !open {
                return Err(Error::state("Transaction is already closed."));
            }

            if !commit {
                state.rolling_back = true;
            } else if state.rolling_back && level > 1 {
                return Err(Error::state(SUB_ROLLED_BACK));
            }

            state.transactions.retain(|open_level, _| *open_level < level);
            state.current_level = level - 1;

            if !state.transactions.is_empty() {
                return Ok(());
            }

            let root = state
                .root_transaction
                .clone()
                .ok_or_else(|| Error::state("No active transaction."))?;
            (root, state.rolling_back)
        };

        if !rolling_back {
            return self.end_by_commit(&root);
        }

        self.end_by_rollback(&root)?;
        if commit {
            // the root was asked to commit, the resources were rolled back instead
            return Err(Error::state(SUB_ROLLED_BACK));
        }
        Ok(())
    }

    fn end_by_rollback(&self, transaction: &Transaction) -> Result<()> {
        let listener_failure = self
            .roll_back(transaction)
            .map_err(|e| self.enter_corrupted_state("Transaction rollback failed.", e))?;
        let close_failure = self.close();

        match listener_failure.or(close_failure) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn end_by_commit(&self, transaction: &Transaction) -> Result<()> {
        if let Err(failure) = self.prepare_commit(transaction) {
            return Err(self.resolve(transaction, failure));
        }

        let listener_failure = match self.commit(transaction) {
            Ok(failure) => failure,
            Err(failure) => return Err(self.resolve(transaction, failure)),
        };
        let close_failure = self.close();

        match listener_failure.or(close_failure) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn resolve(&self, transaction: &Transaction, failure: Failure) -> Error {
        match failure {
            Failure::Reopen(e) => {
                self.reopen(transaction);
                warn!(error = %e, "commit interrupted, transaction reopened");
                e
            }
            Failure::RollBack(cause) => {
                warn!(error = %cause, "commit failed, rolling back");
                if let Err(e) = self.unexpectedly_roll_back(transaction, &cause) {
                    return e;
                }
                Error::UnexpectedRollback {
                    message: "Failure in transaction commit phase caused an unexpected rollback"
                        .to_string(),
                    source: Box::new(cause),
                }
            }
            Failure::Corrupt(reason, cause) => self.enter_corrupted_state(reason, cause),
        }
    }

    fn reopen(&self, transaction: &Transaction) {
        let mut state = self.state_mut();
        state.clear_preparation();
        state.t_ref = transaction.t_ref();
        state.transactions.insert(transaction.level(), transaction.clone());
        state.current_level = transaction.level();
        state.phase = TransactionPhase::Open;
    }

    fn unexpectedly_roll_back(&self, transaction: &Transaction, cause: &Error) -> Result<()> {
        let listener_failure = match self.roll_back(transaction) {
            Ok(failure) => failure,
            Err(e) => {
                return Err(self.enter_corrupted_state(
                    format!(
                        "Unexpected rollback caused by \"{}\" failed. State could be corrupted!",
                        cause
                    ),
                    e,
                ))
            }
        };

        for failure in listener_failure.into_iter().chain(self.close()) {
            warn!(error = %failure, "listener failed during unexpected rollback");
        }

        Ok(())
    }

    fn enter_corrupted_state(&self, reason: impl Into<String>, cause: Error) -> Error {
        let transaction = {
            let mut state = self.state_mut();
            state.phase = TransactionPhase::CorruptedState;
            state.clear_transaction();
            state.root_transaction.take()
        };

        let reason = reason.into();
        error!(%reason, error = %cause, "transaction manager entered corrupted state");
        let err = Error::CorruptedState {
            reason,
            source: Box::new(cause),
        };

        let corrupted_failure = self.each_listener("post_corrupted_state", |listener| {
            listener.post_corrupted_state(transaction.as_ref(), &err)
        });
        let close_failure = transaction.as_ref().and_then(|transaction| {
            self.each_listener("post_close", |listener| listener.post_close(transaction))
        });
        for failure in corrupted_failure.into_iter().chain(close_failure) {
            error!(error = %failure, "listener failed after corruption");
        }

        err
    }

    fn close(&self) -> Option<Error> {
        let transaction = {
            let mut state = self.state_mut();
            let transaction = state.root_transaction.take();
            state.reset();
            transaction
        }?;

        debug!(t_ref = transaction.t_ref(), "transaction closed");
        self.each_listener("post_close", |listener| listener.post_close(&transaction))
    }

    fn enter_phase(&self, phase: TransactionPhase) {
        let mut state = self.state_mut();
        state.t_ref += 1;
        state.phase = phase;
        debug!(phase = %phase, t_ref = state.t_ref, "transaction phase changed");
    }

    /// Starts the commit preparation of every resource all over again.
    ///
    /// Only legal while the commit is being prepared, typically called from
    /// [`TransactionalResource::prepare_commit`] or a `post_prepare` listener.
    pub fn extend_commit_preparation(&self) -> Result<()> {
        let mut state = self.state_mut();
        if state.phase != TransactionPhase::PrepareCommit {
            return Err(Error::state(format!(
                "Can not extend commit preparation in phase {}",
                state.phase
            )));
        }

        state.commit_preparation_extended = true;
        Ok(())
    }

    /// Returns true if the running preparation pass was extended.
    pub fn is_commit_preparation_extended(&self) -> bool {
        self.state().commit_preparation_extended
    }

    /// Number of preparation passes of the running commit
    pub fn commit_preparations_num(&self) -> u32 {
        self.state().commit_preparations_num
    }

    fn prepare_commit(&self, transaction: &Transaction) -> std::result::Result<(), Failure> {
        self.enter_phase(TransactionPhase::PrepareCommit);

        self.try_each_listener(|listener| listener.pre_prepare(transaction))
            .map_err(|e| Failure::Reopen(pre_interrupted("pre_prepare", e)))?;

        'passes: loop {
            self.start_preparation_pass();

            loop {
                while let Some(resource) = self.next_pending_preparation() {
                    resource
                        .prepare_commit(transaction)
                        .map_err(preparation_failure)?;
                    if self.is_commit_preparation_extended() {
                        break;
                    }
                }

                self.try_each_listener(|listener| listener.post_prepare(transaction))
                    .map_err(|e| Failure::Reopen(pre_interrupted("post_prepare", e)))?;

                let state = self.state();
                if state.commit_preparation_extended {
                    continue 'passes;
                }
                // resources registered by post_prepare listeners are prepared in this pass
                if state
                    .pending_commit_preparations
                    .as_ref()
                    .map_or(true, VecDeque::is_empty)
                {
                    break 'passes;
                }
            }
        }

        self.state_mut().pending_commit_preparations = None;
        Ok(())
    }

    fn start_preparation_pass(&self) {
        let mut guard = self.state_mut();
        let state = &mut *guard;
        state.pending_commit_preparations = Some(
            state
                .transactional_resources
                .iter()
                .map(|(id, _)| *id)
                .collect(),
        );
        state.commit_preparation_extended = false;
        state.commit_preparations_num += 1;
        debug!(pass = state.commit_preparations_num, "preparing commit");
    }

    fn next_pending_preparation(&self) -> Option<Rc<dyn TransactionalResource>> {
        let mut guard = self.state_mut();
        let state = &mut *guard;
        let pending = state.pending_commit_preparations.as_mut()?;
        while let Some(id) = pending.pop_front() {
            if let Some(resource) = state
                .transactional_resources
                .iter()
                .find(|(rid, _)| *rid == id)
            {
                return Some(Rc::clone(&resource.1));
            }
        }
        None
    }

    fn commit(&self, transaction: &Transaction) -> std::result::Result<Option<Error>, Failure> {
        self.enter_phase(TransactionPhase::Commit);

        self.try_each_listener(|listener| listener.pre_commit(transaction))
            .map_err(|e| Failure::Reopen(pre_interrupted("pre_commit", e)))?;

        let resources = self.transactional_snapshot();

        for resource in &resources {
            resource.request_commit(transaction).map_err(|e| {
                Failure::RollBack(Error::CommitPreparationFailed {
                    message: format!("Commit request failed: {}", e),
                    deadlock: e.is_deadlock(),
                    source: Box::new(e),
                })
            })?;
        }

        for resource in &resources {
            resource.commit(transaction).map_err(|e| {
                Failure::Corrupt(
                    "Transaction commit failed.",
                    Error::CommitFailed {
                        source: Box::new(e),
                    },
                )
            })?;
        }

        Ok(self.each_listener("post_commit", |listener| listener.post_commit(transaction)))
    }

    /// Rolls back the begun resources. Listener failures are returned, resource
    /// failures are errors.
    fn roll_back(&self, transaction: &Transaction) -> Result<Option<Error>> {
        self.enter_phase(TransactionPhase::Rollback);

        let pre_failure =
            self.each_listener("pre_rollback", |listener| listener.pre_rollback(transaction));

        let begun: Vec<_> = {
            let state = self.state();
            state
                .begun_resources
                .iter()
                .filter_map(|id| state.resource(*id))
                .collect()
        };
        for resource in begun {
            resource
                .roll_back(transaction)
                .map_err(|e| Error::RollbackFailed {
                    source: Box::new(e),
                })?;
        }

        let post_failure =
            self.each_listener("post_rollback", |listener| listener.post_rollback(transaction));

        Ok(pre_failure.or(post_failure))
    }

    fn transactional_snapshot(&self) -> Vec<Rc<dyn TransactionalResource>> {
        self.state()
            .transactional_resources
            .iter()
            .map(|(_, resource)| Rc::clone(resource))
            .collect()
    }

    /// Registers a transactional resource.
    ///
    /// Legal while closed, open or preparing the commit. If a transaction is
    /// open the resource begins it right away; during the commit preparation
    /// it is queued for the running preparation pass.
    pub fn register_resource(&self, resource: Rc<dyn TransactionalResource>) -> Result<ResourceId> {
        let (id, root) = {
            let mut state = self.state_mut();
            if !matches!(
                state.phase,
                TransactionPhase::Closed | TransactionPhase::Open | TransactionPhase::PrepareCommit
            ) {
                return Err(Error::state(format!(
                    "Can not register a new TransactionalResource in {} phase.",
                    state.phase
                )));
            }

            let id = ResourceId(state.next_id());
            state
                .transactional_resources
                .push((id, Rc::clone(&resource)));
            state
                .releasable_resources
                .push((id, Releasable::Transactional(Rc::clone(&resource))));
            (id, state.root_transaction.clone())
        };

        debug!(resource = id.0, "transactional resource registered");

        let Some(root) = root else {
            return Ok(id);
        };

        if let Err(e) = resource.begin_transaction(&root) {
            self.unregister_resource(id);
            return Err(Error::BeginFailed {
                source: Box::new(e),
            });
        }

        let mut state = self.state_mut();
        state.begun_resources.push(id);
        if state.phase == TransactionPhase::PrepareCommit {
            if let Some(pending) = state.pending_commit_preparations.as_mut() {
                pending.push_back(id);
            }
        }

        Ok(id)
    }

    /// Registers a resource that only needs to be released.
    pub fn register_releasable_resource(&self, resource: Rc<dyn ReleasableResource>) -> ResourceId {
        let mut state = self.state_mut();
        let id = ResourceId(state.next_id());
        state
            .releasable_resources
            .push((id, Releasable::Plain(resource)));
        id
    }

    /// Removes a resource. Returns false if it was not registered.
    pub fn unregister_resource(&self, id: ResourceId) -> bool {
        let mut state = self.state_mut();
        let before = state.releasable_resources.len();
        state.transactional_resources.retain(|(rid, _)| *rid != id);
        state.releasable_resources.retain(|(rid, _)| *rid != id);
        state.begun_resources.retain(|rid| *rid != id);
        if let Some(pending) = state.pending_commit_preparations.as_mut() {
            pending.retain(|rid| *rid != id);
        }
        state.releasable_resources.len() != before
    }

    /// Registered transactional resources, in registration order
    pub fn resources(&self) -> Vec<Rc<dyn TransactionalResource>> {
        self.transactional_snapshot()
    }

    /// Releases every registered resource. Fails if a transaction is open.
    pub fn release_resources(&self) -> Result<()> {
        self.ensure_no_transaction_open()?;

        let resources: Vec<Releasable> = self
            .state()
            .releasable_resources
            .iter()
            .map(|(_, resource)| resource.clone())
            .collect();
        for resource in resources {
            resource.release()?;
        }

        Ok(())
    }

    /// Registers a commit listener.
    ///
    /// Listeners are notified in registration order; `prioritize` puts the
    /// listener in front of all others. A listener registered while the
    /// listeners are being notified is notified in the same walk.
    pub fn register_commit_listener(
        &self,
        listener: Rc<dyn CommitListener>,
        prioritize: bool,
    ) -> ListenerId {
        let mut state = self.state_mut();
        let id = ListenerId(state.next_id());
        if prioritize {
            state.commit_listeners.insert(0, (id, listener));
        } else {
            state.commit_listeners.push((id, listener));
        }
        id
    }

    /// Removes a commit listener. Returns false if it was not registered.
    pub fn unregister_commit_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state_mut();
        let before = state.commit_listeners.len();
        state.commit_listeners.retain(|(lid, _)| *lid != id);
        state.commit_listeners.len() != before
    }

    fn next_listener(&self, visited: &mut HashSet<ListenerId>) -> Option<Rc<dyn CommitListener>> {
        let state = self.state();
        let (id, listener) = state
            .commit_listeners
            .iter()
            .find(|(id, _)| !visited.contains(id))?;
        visited.insert(*id);
        Some(Rc::clone(listener))
    }

    fn try_each_listener(&self, mut f: impl FnMut(&dyn CommitListener) -> Result<()>) -> Result<()> {
        let mut visited = HashSet::new();
        while let Some(listener) = self.next_listener(&mut visited) {
            f(listener.as_ref())?;
        }
        Ok(())
    }

    fn each_listener(
        &self,
        callback: &'static str,
        mut f: impl FnMut(&dyn CommitListener) -> Result<()>,
    ) -> Option<Error> {
        let mut first_failure = None;
        let mut visited = HashSet::new();
        while let Some(listener) = self.next_listener(&mut visited) {
            if let Err(e) = f(listener.as_ref()) {
                error!(callback, error = %e, "commit listener failed");
                if first_failure.is_none() {
                    first_failure = Some(Error::PostInterrupted {
                        callback,
                        source: Box::new(e),
                    });
                }
            }
        }
        first_failure
    }
}

fn pre_interrupted(callback: &'static str, e: Error) -> Error {
    Error::PreInterrupted {
        callback,
        source: Box::new(e),
    }
}

fn preparation_failure(e: Error) -> Failure {
    match e {
        Error::Interrupted(_) => Failure::Reopen(pre_interrupted("prepare_commit", e)),
        e => Failure::RollBack(Error::CommitPreparationFailed {
            message: e.to_string(),
            deadlock: e.is_deadlock(),
            source: Box::new(e),
        }),
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("TransactionManager")
            .field("phase", &state.phase)
            .field("t_ref", &state.t_ref)
            .field("current_level", &state.current_level)
            .field("resources", &state.transactional_resources.len())
            .field("listeners", &state.commit_listeners.len())
            .finish()
    }
}
