//! Transaction Demo
//!
//! Two in-memory account books take part in the same transaction:
//! - a transfer that commits on both books
//! - a transfer vetoed by one book and rolled back on both
//! - an audit listener observing every outcome
//! - a deadlocked transfer retried by an isolated procedure

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use concord::{
    ClosureCommitListener, Error, IsolatedProcedure, ReleasableResource, Result, Transaction,
    TransactionManager, TransactionalResource,
};

struct Book {
    name: &'static str,
    balances: RefCell<BTreeMap<&'static str, i64>>,
    pending: RefCell<Vec<(&'static str, i64)>>,
    deadlocks: Cell<u32>,
}

impl Book {
    fn new(name: &'static str, opening: &[(&'static str, i64)]) -> Rc<Self> {
        Rc::new(Self {
            name,
            balances: RefCell::new(opening.iter().copied().collect()),
            pending: RefCell::new(Vec::new()),
            deadlocks: Cell::new(0),
        })
    }

    fn book(&self, account: &'static str, amount: i64) {
        self.pending.borrow_mut().push((account, amount));
    }

    fn balance(&self, account: &str) -> i64 {
        self.balances.borrow().get(account).copied().unwrap_or(0)
    }
}

impl ReleasableResource for Book {
    fn release(&self) -> Result<()> {
        Ok(())
    }
}

impl TransactionalResource for Book {
    fn begin_transaction(&self, _: &Transaction) -> Result<()> {
        self.pending.borrow_mut().clear();
        Ok(())
    }

    fn prepare_commit(&self, _: &Transaction) -> Result<()> {
        if self.deadlocks.get() > 0 {
            self.deadlocks.set(self.deadlocks.get() - 1);
            return Err(Error::deadlock(format!("{} is locked", self.name)));
        }
        Ok(())
    }

    fn request_commit(&self, _: &Transaction) -> Result<()> {
        let balances = self.balances.borrow();
        for (account, amount) in self.pending.borrow().iter() {
            let balance = balances.get(account).copied().unwrap_or(0);
            if balance + amount < 0 {
                return Err(Error::resource(format!(
                    "{}: insufficient funds on {}",
                    self.name, account
                )));
            }
        }
        Ok(())
    }

    fn commit(&self, _: &Transaction) -> Result<()> {
        let mut balances = self.balances.borrow_mut();
        for (account, amount) in self.pending.borrow_mut().drain(..) {
            *balances.entry(account).or_insert(0) += amount;
        }
        Ok(())
    }

    fn roll_back(&self, _: &Transaction) -> Result<()> {
        self.pending.borrow_mut().clear();
        Ok(())
    }
}

fn transfer(tm: &TransactionManager, from: &Book, to: &Book, amount: i64) -> Result<()> {
    let tx = tm.create_transaction(false)?;
    from.book("alice", -amount);
    to.book("bob", amount);
    tx.commit()
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== Concord Transaction Demo ===\n");

    let tm = TransactionManager::new();
    let checking = Book::new("checking", &[("alice", 100)]);
    let savings = Book::new("savings", &[("bob", 0)]);
    tm.register_resource(checking.clone())?;
    tm.register_resource(savings.clone())?;

    let audit = ClosureCommitListener::new()
        .with_post_commit(|tx| {
            println!("   [audit] committed (t_ref {})", tx.t_ref());
            Ok(())
        })
        .with_post_rollback(|_| {
            println!("   [audit] rolled back");
            Ok(())
        });
    tm.register_commit_listener(Rc::new(audit), false);

    // Demo 1: Commit on both books
    println!("1. Transfer 40:");
    transfer(&tm, &checking, &savings, 40)?;
    println!(
        "   ✓ alice {} / bob {}",
        checking.balance("alice"),
        savings.balance("bob")
    );

    // Demo 2: One book vetoes, both roll back
    println!("\n2. Transfer 500:");
    match transfer(&tm, &checking, &savings, 500) {
        Err(e @ Error::UnexpectedRollback { .. }) => println!("   ✓ vetoed: {}", e),
        other => println!("   ✗ unexpected outcome: {:?}", other),
    }
    println!(
        "   ✓ balances unchanged: alice {} / bob {}",
        checking.balance("alice"),
        savings.balance("bob")
    );

    // Demo 3: Deadlocks are retried
    println!("\n3. Transfer 10 with two deadlocks:");
    savings.deadlocks.set(2);
    let attempts = Cell::new(0);
    IsolatedProcedure::new(&tm).with_tries(3)?.exec(|| {
        attempts.set(attempts.get() + 1);
        checking.book("alice", -10);
        savings.book("bob", 10);
        Ok(())
    })?;
    println!(
        "   ✓ committed after {} attempts: alice {} / bob {}",
        attempts.get(),
        checking.balance("alice"),
        savings.balance("bob")
    );

    println!("\n=== Demo Complete ===");
    Ok(())
}
