use tvm_core::{LongCoefficient, Machine, Query, Shared, Traversal, Value};
use tvm_pipes::PipesProcessorFactory;
use tvm_rx::{RxConfig, RxProcessorFactory, Scheduler};

type Q = Query<LongCoefficient>;

fn main() {
    divan::main();
}

fn branching(n: i64) -> Q {
    Q::new()
        .with_id("bench")
        .inject(0..n)
        .repeat(Q::new().union([Q::new().incr(), Q::new().incr()]))
        .times(3)
        .sum()
}

fn run(machine: Shared<Machine<LongCoefficient>>, query: Q) -> Vec<Value> {
    Traversal::from_query(machine, query).to_list().unwrap()
}

#[divan::bench(args = [1_000, 10_000])]
fn pipes_branching(bencher: divan::Bencher, n: i64) {
    let machine = Shared::new(Machine::new().with_processor(Shared::new(PipesProcessorFactory)));
    bencher.bench(|| run(Shared::clone(&machine), branching(n)));
}

#[divan::bench(args = [1_000, 10_000])]
fn rx_serial_branching(bencher: divan::Bencher, n: i64) {
    let factory = RxProcessorFactory::new(RxConfig::default().with_scheduler(Scheduler::Immediate));
    let machine = Shared::new(Machine::new().with_processor(Shared::new(factory)));
    bencher.bench(|| run(Shared::clone(&machine), branching(n)));
}

#[divan::bench(args = [1_000, 10_000])]
fn rx_parallel_branching(bencher: divan::Bencher, n: i64) {
    let factory = RxProcessorFactory::new(
        RxConfig::default()
            .with_pool_size(4)
            .with_scheduler(Scheduler::Immediate),
    );
    let machine = Shared::new(Machine::new().with_processor(Shared::new(factory)));
    bencher.bench(|| run(Shared::clone(&machine), branching(n)));
}

#[divan::bench(args = [100_000])]
fn rx_parallel_sum(bencher: divan::Bencher, n: i64) {
    let factory = RxProcessorFactory::new(
        RxConfig::default()
            .with_pool_size(4)
            .with_scheduler(Scheduler::Immediate),
    );
    let machine = Shared::new(Machine::new().with_processor(Shared::new(factory)));
    bencher.bench(|| run(Shared::clone(&machine), Q::new().with_id("sum").inject(0..n).incr().sum()));
}
