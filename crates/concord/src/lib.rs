//! # Concord
//!
//! An in-process transaction coordinator. Subsystems owning transactional
//! state (pooled connections, caches, message outboxes) register themselves as
//! resources; a request handler opens a transaction, does its work and
//! commits. Concord drives every resource through begin, commit preparation,
//! a two-phase commit vote and the final commit, or rolls all of them back.
//!
//! ## Quick Start
//!
//! ```rust
//! use concord::{Result, Transaction, TransactionManager, TransactionalResource, ReleasableResource};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! #[derive(Default)]
//! struct Outbox {
//!     staged: RefCell<Vec<String>>,
//!     sent: RefCell<Vec<String>>,
//! }
//!
//! impl ReleasableResource for Outbox {
//!     fn release(&self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! impl TransactionalResource for Outbox {
//!     fn begin_transaction(&self, _: &Transaction) -> Result<()> {
//!         self.staged.borrow_mut().clear();
//!         Ok(())
//!     }
//!     fn prepare_commit(&self, _: &Transaction) -> Result<()> {
//!         Ok(())
//!     }
//!     fn commit(&self, _: &Transaction) -> Result<()> {
//!         let staged = self.staged.borrow_mut().drain(..).collect::<Vec<_>>();
//!         self.sent.borrow_mut().extend(staged);
//!         Ok(())
//!     }
//!     fn roll_back(&self, _: &Transaction) -> Result<()> {
//!         self.staged.borrow_mut().clear();
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let tm = TransactionManager::new();
//!     let outbox = Rc::new(Outbox::default());
//!     tm.register_resource(outbox.clone())?;
//!
//!     let tx = tm.create_transaction(false)?;
//!     outbox.staged.borrow_mut().push("order placed".to_string());
//!     tx.commit()?;
//!
//!     assert_eq!(outbox.sent.borrow().len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Retrying deadlocks
//!
//! ```rust
//! use concord::{IsolatedProcedure, TransactionManager};
//!
//! let tm = TransactionManager::new();
//! let total = IsolatedProcedure::new(&tm)
//!     .with_tries(3)?
//!     .exec(|| Ok(21 * 2))?;
//! assert_eq!(total, 42);
//! # Ok::<(), concord::Error>(())
//! ```

pub mod logging;

// Re-export core types
pub use concord_core::{Error, Result};

// Protocol
pub use concord_core::{
    ListenerId, ResourceId, Transaction, TransactionManager, TransactionPhase,
};

// Participants and observers
pub use concord_core::{
    ClosureCommitListener, CommitListener, ReleasableResource, TransactionalResource,
};

// Retry and scheduling helpers
pub use concord_core::{DeadlockHandler, IsolatedProcedure, IsolationConfig, TransactionHooks};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
