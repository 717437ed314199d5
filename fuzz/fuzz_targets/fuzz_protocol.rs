#![no_main]

use arbitrary::Arbitrary;
use concord::{
    ClosureCommitListener, Error, ReleasableResource, Result, ResourceId, Transaction,
    TransactionManager, TransactionPhase, TransactionalResource,
};
use libfuzzer_sys::fuzz_target;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Arbitrary, Debug, Clone, Copy, PartialEq)]
enum Method {
    Begin,
    Prepare,
    Request,
    Commit,
    RollBack,
}

#[derive(Arbitrary, Debug, Clone, Copy)]
enum Fault {
    Fail,
    Deadlock,
    Interrupt,
    Extend,
}

#[derive(Arbitrary, Debug)]
enum Op {
    Create { read_only: bool },
    Commit { level: u8 },
    RollBack { level: u8 },
    Register { fault: Option<(Method, Fault)> },
    Unregister { index: u8 },
    Listener { prioritize: bool, fail_post_commit: bool },
    Extend,
    Release,
}

/// Resource checking that it is driven in protocol order
struct Probe {
    calls: RefCell<Vec<Method>>,
    fault: Cell<Option<(Method, Fault)>>,
}

impl Probe {
    fn call(&self, method: Method, tx: &Transaction) -> Result<()> {
        let last = self.calls.borrow().last().copied();
        match method {
            Method::Commit => assert_eq!(last, Some(Method::Request)),
            Method::Request => assert_eq!(last, Some(Method::Prepare)),
            _ => {}
        }
        self.calls.borrow_mut().push(method);

        match self.fault.get() {
            Some((m, fault)) if m == method => {
                self.fault.set(None);
                match fault {
                    Fault::Fail => Err(Error::resource("injected")),
                    Fault::Deadlock => Err(Error::deadlock("injected")),
                    Fault::Interrupt => Err(Error::interrupt("injected")),
                    Fault::Extend => tx
                        .manager()
                        .map_or(Ok(()), |tm| tm.extend_commit_preparation()),
                }
            }
            _ => Ok(()),
        }
    }
}

impl ReleasableResource for Probe {
    fn release(&self) -> Result<()> {
        Ok(())
    }
}

impl TransactionalResource for Probe {
    fn begin_transaction(&self, tx: &Transaction) -> Result<()> {
        self.calls.borrow_mut().clear();
        self.call(Method::Begin, tx)
    }

    fn prepare_commit(&self, tx: &Transaction) -> Result<()> {
        self.call(Method::Prepare, tx)
    }

    fn request_commit(&self, tx: &Transaction) -> Result<()> {
        self.call(Method::Request, tx)
    }

    fn commit(&self, tx: &Transaction) -> Result<()> {
        self.call(Method::Commit, tx)
    }

    fn roll_back(&self, tx: &Transaction) -> Result<()> {
        self.call(Method::RollBack, tx)
    }
}

fuzz_target!(|ops: Vec<Op>| {
    let tm = TransactionManager::new();
    let mut levels: Vec<Transaction> = Vec::new();
    let mut resources: Vec<ResourceId> = Vec::new();
    let closes = Rc::new(Cell::new(0u32));

    let counter = Rc::clone(&closes);
    tm.register_commit_listener(
        Rc::new(ClosureCommitListener::new().with_post_close(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        })),
        false,
    );

    // Limit operations to prevent timeout
    for op in ops.into_iter().take(200) {
        let was_open = tm.has_open_transaction();
        let closes_before = closes.get();

        match op {
            Op::Create { read_only } => {
                if let Ok(tx) = tm.create_transaction(read_only) {
                    levels.push(tx);
                }
            }
            Op::Commit { level } | Op::RollBack { level } if levels.is_empty() => {
                let _ = level;
            }
            Op::Commit { level } => {
                let tx = levels[level as usize % levels.len()].clone();
                let _ = tx.commit();
            }
            Op::RollBack { level } => {
                let tx = levels[level as usize % levels.len()].clone();
                let _ = tx.roll_back();
            }
            Op::Register { fault } => {
                let probe = Rc::new(Probe {
                    calls: RefCell::new(Vec::new()),
                    fault: Cell::new(fault),
                });
                if let Ok(id) = tm.register_resource(probe) {
                    resources.push(id);
                }
            }
            Op::Unregister { index } => {
                if !resources.is_empty() {
                    let id = resources.remove(index as usize % resources.len());
                    tm.unregister_resource(id);
                }
            }
            Op::Listener {
                prioritize,
                fail_post_commit,
            } => {
                let listener = ClosureCommitListener::new().with_post_commit(move |_| {
                    if fail_post_commit {
                        Err(Error::resource("listener"))
                    } else {
                        Ok(())
                    }
                });
                tm.register_commit_listener(Rc::new(listener), prioritize);
            }
            Op::Extend => {
                assert!(tm.extend_commit_preparation().is_err());
            }
            Op::Release => {
                assert_eq!(tm.release_resources().is_ok(), !tm.has_open_transaction());
            }
        }

        let phase = tm.phase();
        assert!(matches!(
            phase,
            TransactionPhase::Closed | TransactionPhase::Open | TransactionPhase::CorruptedState
        ));
        assert_eq!(tm.has_open_transaction(), phase == TransactionPhase::Open);
        if !tm.has_open_transaction() {
            assert_eq!(tm.current_level(), 0);
            assert_eq!(tm.is_read_only(), None);
            levels.clear();
        }
        if was_open && !tm.has_open_transaction() {
            assert_eq!(closes.get(), closes_before + 1);
        }
        if phase == TransactionPhase::CorruptedState {
            assert!(tm.create_transaction(false).is_err());
        }
    }
});
