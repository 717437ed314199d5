//! # Concord Core
//!
//! Transaction coordination for heterogeneous resources.
//!
//! A [`TransactionManager`] drives every registered [`TransactionalResource`]
//! through a nested, two-phase protocol: begin, one or more commit
//! preparation passes, the commit vote, and the final commit or a rollback.
//! [`CommitListener`]s observe each phase, and [`IsolatedProcedure`] retries a
//! unit of work that ended in a deadlock.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hooks;
pub mod isolated;
pub mod listener;
pub mod manager;
pub mod resource;
pub mod transaction;


pub use error::{Error, Result};
pub use hooks::TransactionHooks;
pub use isolated::{DeadlockHandler, IsolatedProcedure, IsolationConfig};
pub use listener::{ClosureCommitListener, CommitListener};
pub use manager::{ListenerId, ResourceId, TransactionManager};
pub use resource::{ReleasableResource, TransactionalResource};
pub use transaction::{Transaction, TransactionPhase};
