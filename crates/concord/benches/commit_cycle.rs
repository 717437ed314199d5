use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use concord::{
    ClosureCommitListener, ReleasableResource, Result, Transaction, TransactionManager,
    TransactionalResource,
};
use std::rc::Rc;

/// Resource doing no work, so only the coordination overhead is measured
struct NoopResource;

impl ReleasableResource for NoopResource {
    fn release(&self) -> Result<()> {
        Ok(())
    }
}

impl TransactionalResource for NoopResource {
    fn begin_transaction(&self, _: &Transaction) -> Result<()> {
        Ok(())
    }

    fn prepare_commit(&self, _: &Transaction) -> Result<()> {
        Ok(())
    }

    fn commit(&self, _: &Transaction) -> Result<()> {
        Ok(())
    }

    fn roll_back(&self, _: &Transaction) -> Result<()> {
        Ok(())
    }
}

fn manager_with(resources: usize, listeners: usize) -> TransactionManager {
    let tm = TransactionManager::new();
    for _ in 0..resources {
        let _ = tm.register_resource(Rc::new(NoopResource));
    }
    for _ in 0..listeners {
        tm.register_commit_listener(Rc::new(ClosureCommitListener::new()), false);
    }
    tm
}

fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");

    for resources in [1usize, 8, 64] {
        let tm = manager_with(resources, 4);
        group.throughput(Throughput::Elements(resources as u64));
        group.bench_with_input(BenchmarkId::from_parameter(resources), &tm, |b, tm| {
            b.iter(|| {
                let tx = tm.create_transaction(false).unwrap();
                black_box(tx.commit()).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_rollback(c: &mut Criterion) {
    let tm = manager_with(8, 4);
    c.bench_function("rollback_8_resources", |b| {
        b.iter(|| {
            let tx = tm.create_transaction(false).unwrap();
            black_box(tx.roll_back()).unwrap();
        });
    });
}

fn bench_nested_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested");

    for depth in [2usize, 16] {
        let tm = manager_with(4, 0);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let levels: Vec<_> = (0..depth)
                    .map(|_| tm.create_transaction(false).unwrap())
                    .collect();
                for level in levels.iter().rev() {
                    level.commit().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_commit, bench_rollback, bench_nested_levels);
criterion_main!(benches);
