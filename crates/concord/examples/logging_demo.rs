use std::rc::Rc;

use concord::logging::LogConfig;
use concord::{ClosureCommitListener, TransactionHooks, TransactionManager};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Phase changes of the manager are logged at debug level
    let _guard = LogConfig::protocol_trace().init()?;

    println!("=== Concord Logging Demo ===\n");

    let tm = TransactionManager::new();
    let hooks = TransactionHooks::new(&tm);
    tm.register_commit_listener(
        Rc::new(ClosureCommitListener::new().with_post_close(|_| {
            tracing::info!("transaction closed");
            Ok(())
        })),
        false,
    );

    println!("1. Nested commit...");
    let root = tm.create_transaction(false)?;
    let nested = tm.create_transaction(false)?;
    hooks.post_commit(|| {
        tracing::info!("post commit hook");
        Ok(())
    })?;
    nested.commit()?;
    root.commit()?;

    println!("\n2. Rollback...");
    let tx = tm.create_transaction(false)?;
    tx.roll_back()?;

    println!("\n3. Extending outside preparation fails...");
    if let Err(e) = tm.extend_commit_preparation() {
        tracing::warn!(error = %e, "rejected");
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
