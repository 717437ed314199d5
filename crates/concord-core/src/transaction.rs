//! Transaction handles and phases.
//!
//! A [`Transaction`] represents one nesting level of the transaction owned by a
//! [`TransactionManager`]. Only the root level (level 1) talks to resources;
//! nested levels merely gate when the root may close and whether the close
//! ends in a commit or a rollback.

use std::fmt;
use std::rc::Weak;

use serde::{Deserialize, Serialize};

use crate::manager::{ManagerInner, TransactionManager};
use crate::{Error, Result};

/// Phases of the transaction state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPhase {
    /// No transaction is open
    Closed,
    /// A transaction is open and accepts work
    Open,
    /// Resources are preparing the commit
    PrepareCommit,
    /// Resources are voting on and applying the commit
    Commit,
    /// Resources are rolling back
    Rollback,
    /// A commit or rollback failed; no further transactions are allowed
    CorruptedState,
}

impl TransactionPhase {
    /// Human readable name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionPhase::Closed => "closed",
            TransactionPhase::Open => "open",
            TransactionPhase::PrepareCommit => "prepare commit",
            TransactionPhase::Commit => "commit",
            TransactionPhase::Rollback => "rollback",
            TransactionPhase::CorruptedState => "corrupted state",
        }
    }

    /// Returns true while the manager is resolving a transaction.
    pub fn is_completing(&self) -> bool {
        matches!(
            self,
            TransactionPhase::PrepareCommit | TransactionPhase::Commit | TransactionPhase::Rollback
        )
    }
}

impl fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle of one transaction level.
///
/// Handles are cheap to clone. Closing a level through [`Transaction::commit`]
/// or [`Transaction::roll_back`] makes every clone of it stale; further close
/// requests fail with a state error.
#[derive(Clone)]
pub struct Transaction {
    manager: Weak<ManagerInner>,
    id: u64,
    level: usize,
    t_ref: u64,
    read_only: bool,
}

impl Transaction {
    pub(crate) fn new(
        manager: Weak<ManagerInner>,
        id: u64,
        level: usize,
        t_ref: u64,
        read_only: bool,
    ) -> Self {
        Self {
            manager,
            id,
            level,
            t_ref,
            read_only,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Nesting level, 1 for the root transaction
    pub fn level(&self) -> usize {
        self.level
    }

    /// Epoch of the manager when this handle was created
    pub fn t_ref(&self) -> u64 {
        self.t_ref
    }

    /// Returns true if this level was opened read only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns true for the root level.
    pub fn is_root(&self) -> bool {
        self.level == 1
    }

    /// The manager owning this transaction, if it still exists
    pub fn manager(&self) -> Option<TransactionManager> {
        TransactionManager::upgrade(&self.manager)
    }

    /// Commits this level.
    ///
    /// Closing the root level drives the whole protocol: preparation, the
    /// commit vote and the final commit on every registered resource.
    pub fn commit(&self) -> Result<()> {
        self.close(true)
    }

    /// Rolls back this level.
    ///
    /// The rollback is sticky: once any level rolled back, the root can only
    /// end in a rollback.
    pub fn roll_back(&self) -> Result<()> {
        self.close(false)
    }

    fn close(&self, commit: bool) -> Result<()> {
        let manager = self
            .manager()
            .ok_or_else(|| Error::state("Transaction manager no longer exists."))?;
        manager.close_level(self.id, self.level, self.t_ref, commit)
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && Weak::ptr_eq(&self.manager, &other.manager)
    }
}

impl Eq for Transaction {}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("t_ref", &self.t_ref)
            .field("read_only", &self.read_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completing_phases() {
        assert!(TransactionPhase::PrepareCommit.is_completing());
        assert!(TransactionPhase::Commit.is_completing());
        assert!(TransactionPhase::Rollback.is_completing());
        assert!(!TransactionPhase::Open.is_completing());
        assert!(!TransactionPhase::Closed.is_completing());
        assert!(!TransactionPhase::CorruptedState.is_completing());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(TransactionPhase::PrepareCommit.to_string(), "prepare commit");
        assert_eq!(TransactionPhase::CorruptedState.to_string(), "corrupted state");
    }

    #[test]
    fn test_orphaned_handle_cannot_close() {
        let tx = Transaction::new(Weak::new(), 1, 1, 1, false);
        assert!(tx.manager().is_none());
        assert!(tx.commit().unwrap_err().is_state_error());
    }
}
