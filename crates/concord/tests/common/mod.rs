// Common test utilities for protocol integration tests

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use concord::{Error, ReleasableResource, Result, Transaction, TransactionalResource};

/// Shared, ordered record of every call made to the stores of a test
pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// One-shot misbehaviour of a store method
#[allow(dead_code)]
pub enum Fault {
    Fail(&'static str),
    Deadlock,
    Interrupt,
    ExtendPreparation,
}

/// Key-value store buffering writes until the transaction commits.
pub struct StagedStore {
    name: &'static str,
    log: EventLog,
    committed: RefCell<BTreeMap<String, i64>>,
    staged: RefCell<Option<BTreeMap<String, i64>>>,
    faults: RefCell<Vec<(&'static str, Fault)>>,
    released: RefCell<u32>,
}

#[allow(dead_code)]
impl StagedStore {
    pub fn new(name: &'static str, log: &EventLog) -> Rc<Self> {
        Rc::new(Self {
            name,
            log: Rc::clone(log),
            committed: RefCell::new(BTreeMap::new()),
            staged: RefCell::new(None),
            faults: RefCell::new(Vec::new()),
            released: RefCell::new(0),
        })
    }

    /// Queues a fault for the next call of `method`.
    pub fn inject(&self, method: &'static str, fault: Fault) {
        self.faults.borrow_mut().push((method, fault));
    }

    pub fn put(&self, key: &str, value: i64) -> Result<()> {
        match self.staged.borrow_mut().as_mut() {
            Some(staged) => {
                staged.insert(key.to_string(), value);
                Ok(())
            }
            None => Err(Error::resource("store is not part of a transaction")),
        }
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        if let Some(value) = self
            .staged
            .borrow()
            .as_ref()
            .and_then(|staged| staged.get(key).copied())
        {
            return Some(value);
        }
        self.committed.borrow().get(key).copied()
    }

    pub fn committed(&self, key: &str) -> Option<i64> {
        self.committed.borrow().get(key).copied()
    }

    pub fn in_transaction(&self) -> bool {
        self.staged.borrow().is_some()
    }

    pub fn released(&self) -> u32 {
        *self.released.borrow()
    }

    /// Calls received by this store, without the store name
    pub fn calls(&self) -> Vec<String> {
        let prefix = format!("{}:", self.name);
        self.log
            .borrow()
            .iter()
            .filter_map(|event| event.strip_prefix(&prefix).map(String::from))
            .collect()
    }

    fn enter(&self, method: &'static str, tx: &Transaction) -> Result<()> {
        self.log
            .borrow_mut()
            .push(format!("{}:{}", self.name, method));

        let fault = {
            let mut faults = self.faults.borrow_mut();
            faults
                .iter()
                .position(|(m, _)| *m == method)
                .map(|i| faults.remove(i).1)
        };

        match fault {
            None => Ok(()),
            Some(Fault::Fail(message)) => Err(Error::resource(message)),
            Some(Fault::Deadlock) => Err(Error::deadlock(format!("{} deadlocked", self.name))),
            Some(Fault::Interrupt) => Err(Error::interrupt(format!("{} not ready", self.name))),
            Some(Fault::ExtendPreparation) => match tx.manager() {
                Some(tm) => tm.extend_commit_preparation(),
                None => Err(Error::resource("manager dropped")),
            },
        }
    }
}

impl ReleasableResource for StagedStore {
    fn release(&self) -> Result<()> {
        if self.in_transaction() {
            return Err(Error::resource("cannot release during a transaction"));
        }
        *self.released.borrow_mut() += 1;
        Ok(())
    }
}

impl TransactionalResource for StagedStore {
    fn begin_transaction(&self, tx: &Transaction) -> Result<()> {
        self.enter("begin", tx)?;
        *self.staged.borrow_mut() = Some(BTreeMap::new());
        Ok(())
    }

    fn prepare_commit(&self, tx: &Transaction) -> Result<()> {
        self.enter("prepare", tx)
    }

    fn request_commit(&self, tx: &Transaction) -> Result<()> {
        self.enter("request", tx)
    }

    fn commit(&self, tx: &Transaction) -> Result<()> {
        self.enter("commit", tx)?;
        if let Some(staged) = self.staged.borrow_mut().take() {
            self.committed.borrow_mut().extend(staged);
        }
        Ok(())
    }

    fn roll_back(&self, tx: &Transaction) -> Result<()> {
        self.enter("roll_back", tx)?;
        self.staged.borrow_mut().take();
        Ok(())
    }
}
