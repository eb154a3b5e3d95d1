use std::thread;

use crossbeam_channel::bounded;
use rstest::{fixture, rstest};
use tvm_core::{
    FunctionKind, LongCoefficient, Machine, Processor, ProcessorFactory, Query, Result, Shared, Traversal,
    Value,
};
use tvm_pipes::PipesProcessorFactory;
use tvm_rx::{PoolRegistry, RxConfig, RxProcessorFactory, Scheduler};

type Q = Query<LongCoefficient>;
type M = Shared<Machine<LongCoefficient>>;

fn machine(factory: impl ProcessorFactory<LongCoefficient> + 'static) -> M {
    Shared::new(Machine::new().with_processor(Shared::new(factory)))
}

#[fixture]
fn pipes() -> M {
    machine(PipesProcessorFactory)
}

fn rx(pool_size: usize, scheduler: Scheduler) -> M {
    machine(RxProcessorFactory::new(
        RxConfig::default()
            .with_pool_size(pool_size)
            .with_scheduler(scheduler),
    ))
}

fn run(machine: &M, query: Q) -> Result<Vec<Value>> {
    Traversal::from_query(Shared::clone(machine), query).to_list()
}

fn sorted(values: Result<Vec<Value>>) -> Result<Vec<Value>> {
    values.map(|mut values| {
        values.sort();
        values
    })
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::Int(*v)).collect()
}

#[rstest]
#[case::map(Q::new().inject([1, 2, 3]).incr(), ints(&[2, 3, 4]))]
#[case::filter(Q::new().inject([1, 2, 3]).filter(Q::new().is_cmp("gte", 2)), ints(&[2, 3]))]
#[case::flat_map(Q::new().inject([Value::List(ints(&[1, 2]))]).unfold().incr(), ints(&[2, 3]))]
#[case::sum(Q::new().inject([1, 2, 3]).incr().sum(), ints(&[9]))]
#[case::count_empty(Q::new().inject(Vec::<i64>::new()).count(), ints(&[0]))]
#[case::count_twice(Q::new().inject([1, 2, 3]).count().count(), ints(&[1]))]
#[case::order(Q::new().inject([3, 1, 2]).order(), ints(&[1, 2, 3]))]
#[case::order_then_sum(Q::new().inject([3, 1, 2]).order_desc().sum(), ints(&[6]))]
#[case::dedup(Q::new().inject([3, 1, 3]).dedup(), ints(&[3, 1]))]
#[case::union(Q::new().inject([1, 2]).union([Q::new().incr(), Q::new().constant(0)]), ints(&[2, 0, 3, 0]))]
#[case::union_count(Q::new().inject([1, 2]).union([Q::new().count()]), ints(&[1, 1]))]
#[case::choose(
    Q::new().inject([1, 2, 3]).choose(Q::new().is(2), Q::new().constant(20), Some(Q::new().constant(0))),
    ints(&[0, 20, 0])
)]
#[case::times(Q::new().inject([1, 10]).repeat(Q::new().incr()).times(3), ints(&[4, 13]))]
#[case::emit_before(Q::new().inject([0]).emit().repeat(Q::new().incr()).times(2), ints(&[0, 1, 2]))]
#[case::emit_after(
    Q::new().inject([0]).repeat(Q::new().incr()).emit().until(Q::new().is(3)),
    ints(&[1, 2, 3])
)]
#[case::branching_body(
    Q::new().inject([0]).repeat(Q::new().union([Q::new().incr(), Q::new().constant(5)])).times(2),
    ints(&[2, 5, 6, 5])
)]
#[case::inner_times_before(
    Q::new().inject([0]).repeat(Q::new().times(1).repeat(Q::new().incr())).times(2),
    ints(&[2])
)]
#[case::inner_times_before_outlives_outer_count(
    Q::new().inject([0, 10]).repeat(Q::new().times(2).repeat(Q::new().incr())).times(3),
    ints(&[6, 16])
)]
#[case::partitioned_sum(Q::new().inject(1..=100).incr().sum(), ints(&[5150]))]
fn test_engines(
    #[values(rx(0, Scheduler::Immediate), rx(0, Scheduler::NewThread), rx(4, Scheduler::Immediate), rx(4, Scheduler::NewThread))]
    engine: M,
    #[case] query: Q,
    #[case] expected: Vec<Value>,
) {
    assert_eq!(run(&engine, query.clone()), Ok(expected.clone()));
    assert_eq!(run(&pipes(), query), Ok(expected));
}

#[rstest]
fn test_group_count_partitions_merge(#[values(0, 1, 3)] pool_size: usize) {
    let engine = rx(pool_size, Scheduler::Immediate);
    let query = Q::new()
        .inject(["a", "b", "a", "c", "b", "a"])
        .group_count();
    let expected = Value::Map(
        [
            ("a".into(), Value::Int(3)),
            ("b".into(), Value::Int(2)),
            ("c".into(), Value::Int(1)),
        ]
        .into_iter()
        .collect(),
    );
    assert_eq!(run(&engine, query), Ok(vec![expected]));
}

#[rstest]
fn test_errors_are_yielded(#[values(0, 2)] pool_size: usize) {
    let engine = rx(pool_size, Scheduler::NewThread);
    let results: Vec<_> = Traversal::from_query(engine, Q::new().inject([Value::Int(1), "x".into()]).incr()).collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

#[test]
fn test_streams_unbounded_repeat() {
    let engine = rx(0, Scheduler::NewThread);
    let query = Q::new().inject([0]).repeat(Q::new().incr()).emit();
    let first: Vec<Value> = Traversal::from_query(engine, query)
        .take(3)
        .map(|object| object.map(|o| (*o).clone()))
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(first, ints(&[1, 2, 3]));
}

#[test]
fn test_saturated_pool_falls_back_to_serial() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let factory = RxProcessorFactory::new(
        RxConfig::default()
            .with_pool_size(1)
            .with_scheduler(Scheduler::Immediate),
    );
    let engine = Machine::new().with_processor(Shared::new(factory.clone()));
    let query = Q::new()
        .with_id("saturated")
        .inject([1, 2, 3])
        .union([Q::new().incr(), Q::new().constant(0)]);

    let mut program = query.clone().into_program();
    let compilation = engine.compile(&mut program).unwrap();

    let idle = factory.processor(&compilation).unwrap();
    assert!(idle.is_parallel());
    let parallel = sorted(
        idle.iterator(Vec::new())
            .map(|traverser| traverser.map(|t| t.object().clone()))
            .collect(),
    );

    let pool = factory.registry().get("saturated").unwrap();
    let (release, blocked) = bounded::<()>(0);
    pool.spawn(move || {
        let _ = blocked.recv();
    });
    while pool.active_count() < pool.max() {
        thread::yield_now();
    }

    let saturated = factory.processor(&compilation).unwrap();
    assert!(!saturated.is_parallel());
    let serial = sorted(
        saturated
            .iterator(Vec::new())
            .map(|traverser| traverser.map(|t| t.object().clone()))
            .collect(),
    );

    release.send(()).unwrap();

    assert_eq!(serial, parallel);
    assert_eq!(serial, Ok(ints(&[0, 0, 0, 2, 3, 4])));
    assert_eq!(sorted(run(&pipes(), query)), serial);
}

#[test]
fn test_nested_compilations_run_serially() {
    let factory = RxProcessorFactory::new(RxConfig::default().with_pool_size(2));
    let engine = Machine::new().with_processor(Shared::new(factory.clone()));
    let mut program = Q::new()
        .with_id("nested")
        .inject([1])
        .union([Q::new().incr()])
        .into_program();
    let compilation = engine.compile(&mut program).unwrap();
    assert!(factory.processor(&compilation).unwrap().is_parallel());

    let FunctionKind::Branch(branch) = compilation.functions()[1].kind() else {
        panic!("expected a branch, got {:?}", compilation);
    };
    let nested = branch.compilations().next().unwrap();
    assert!(nested.is_nested());
    assert!(!factory.processor(nested).unwrap().is_parallel());
    assert_eq!(factory.registry().len(), 1);
}

#[test]
fn test_without_id_or_pool_runs_serially() {
    let factory = RxProcessorFactory::new(RxConfig::default());
    let engine = Machine::new().with_processor(Shared::new(factory.clone()));
    let mut program = Q::new().with_id("q").inject([1]).into_program();
    let compilation = engine.compile(&mut program).unwrap();

    assert!(!factory.processor(&compilation).unwrap().is_parallel());
    assert!(factory.registry().is_empty());
}

#[test]
fn test_assigns_query_id_for_pools() {
    let factory = RxProcessorFactory::new(RxConfig::default().with_pool_size(2));
    let engine = Shared::new(Machine::new().with_processor(Shared::new(factory.clone())));

    assert_eq!(run(&engine, Q::new().inject([1, 2]).incr()), Ok(ints(&[2, 3])));
    assert_eq!(factory.registry().len(), 1);
}

#[test]
fn test_registry_is_shared_under_concurrent_lookup() {
    let registry = Shared::new(PoolRegistry::new());

    let pools: Vec<_> = (0..8)
        .map(|_| {
            let registry = Shared::clone(&registry);
            thread::spawn(move || registry.get_or_create("shared", 2).unwrap())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(registry.len(), 1);
    assert!(pools.iter().all(|pool| Shared::ptr_eq(pool, &pools[0])));
}

#[test]
fn test_factories_share_injected_registry() {
    let registry = Shared::new(PoolRegistry::new());
    let config = RxConfig::default().with_pool_size(2).with_scheduler(Scheduler::Immediate);
    let first = machine(RxProcessorFactory::new(config.clone()).with_registry(Shared::clone(&registry)));
    let second = machine(RxProcessorFactory::new(config).with_registry(Shared::clone(&registry)));

    let query = || Q::new().with_id("q").inject([1, 2, 3]).sum();
    assert_eq!(run(&first, query()), Ok(ints(&[6])));
    assert_eq!(run(&second, query()), Ok(ints(&[6])));
    assert_eq!(registry.len(), 1);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn shape(index: usize, values: Vec<i64>) -> Q {
        let source = Q::new().with_id("equivalence").inject(values);
        match index {
            0 => source.incr().is_cmp("gt", 0),
            1 => source.union([Q::new().incr(), Q::new().constant(1)]).sum(),
            2 => source
                .repeat(Q::new().union([Q::new().incr(), Q::new().incr()]))
                .times(2)
                .sum(),
            3 => source
                .choose(Q::new().is_cmp("gt", 0), Q::new().incr(), Some(Q::new().constant(0)))
                .group_count(),
            _ => source.order().dedup(),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_engines_agree(values in prop::collection::vec(-20i64..20, 0..40), index in 0usize..5) {
            let pipes = pipes();
            let serial = rx(0, Scheduler::Immediate);
            let parallel = rx(3, Scheduler::NewThread);

            let expected = sorted(run(&pipes, shape(index, values.clone())));
            prop_assert_eq!(sorted(run(&serial, shape(index, values.clone()))), expected.clone());
            prop_assert_eq!(sorted(run(&parallel, shape(index, values))), expected);
        }
    }
}
