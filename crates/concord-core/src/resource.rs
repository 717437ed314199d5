//! Participants driven by the transaction manager.

use crate::transaction::Transaction;
use crate::Result;

/// A resource that can be notified of a coming idle period.
pub trait ReleasableResource {
    /// Notifies the resource of a possibly longer idle time.
    ///
    /// A resource holding a pooled connection may close it here and reopen it
    /// when it is used next. Must fail if a transaction is open.
    fn release(&self) -> Result<()>;
}

/// A participant of the coordinated begin/prepare/commit/rollback protocol.
///
/// Every method receives the root transaction. Implementations use interior
/// mutability; the manager holds no borrow while calling them, so a resource
/// may call back into the manager (for example to extend the commit
/// preparation or to register another resource).
pub trait TransactionalResource: ReleasableResource {
    /// Called once when the root transaction opens, or when the resource is
    /// registered while a transaction is already open.
    fn begin_transaction(&self, transaction: &Transaction) -> Result<()>;

    /// Prepares the commit.
    ///
    /// May be called several times if the preparation gets extended. Returning
    /// [`crate::Error::interrupt`] aborts the commit but keeps the transaction
    /// open; any other failure rolls the transaction back.
    fn prepare_commit(&self, transaction: &Transaction) -> Result<()>;

    /// Voting phase of the two-phase commit.
    ///
    /// A failure vetoes the commit and rolls the transaction back.
    fn request_commit(&self, _transaction: &Transaction) -> Result<()> {
        Ok(())
    }

    /// Applies the commit once every resource voted yes.
    ///
    /// A failure here puts the manager into the corrupted state.
    fn commit(&self, transaction: &Transaction) -> Result<()>;

    /// Rolls back the transaction.
    ///
    /// A failure here puts the manager into the corrupted state.
    fn roll_back(&self, transaction: &Transaction) -> Result<()>;
}
