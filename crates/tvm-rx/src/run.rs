//! Push execution of a [`Plan`].
//!
//! Traversers are pushed stage by stage down to the sink. Reduce and barrier stages
//! hold what reaches them until the source is exhausted; completion then flushes them
//! in stage order, so nothing crosses a barrier early.

use tracing::trace;
use tvm_core::{
    Coefficient, Result, Shared, Traverser, TraverserSet, Value, function::ReduceFunction,
};

use crate::{
    plan::{Plan, RepeatHead, RepeatTail, Stage},
    pool::WorkerPool,
};

/// Receives every traverser leaving a plan. An error stops the run.
pub(crate) type Sink<'s, C> = dyn FnMut(Traverser<C>) -> Result<()> + 's;

enum State<C: Coefficient> {
    Stateless,
    Reduce(Option<Value>),
    Barrier(Option<TraverserSet<C>>),
}

/// Runs `plan` over `starts`, or over the objects of its initial stage when it has one.
///
/// With a pool, branch arms and repeat bodies are fanned out to workers and a leading
/// reduce is computed per partition, then merged.
pub(crate) fn execute<C: Coefficient>(
    plan: &Plan<C>,
    pool: Option<&WorkerPool>,
    starts: Vec<Traverser<C>>,
    sink: &mut Sink<'_, C>,
) -> Result<()> {
    let mut run = Run::new(plan, pool);
    let (start, sources) = run.sources(starts);

    match (pool, plan.partitionable_reduce()) {
        (Some(pool), Some((index, function))) => {
            let merged = run.reduce_partitioned(pool, start, index, function, sources.collect())?;
            run.states[index] = State::Reduce(Some(merged));
        }
        _ => {
            for traverser in sources {
                run.push(start, traverser, sink)?;
            }
        }
    }

    run.complete(start, sink)
}

/// Runs `plan` to completion and gathers its output.
pub(crate) fn collect<C: Coefficient>(
    plan: &Plan<C>,
    pool: Option<&WorkerPool>,
    starts: Vec<Traverser<C>>,
) -> Result<Vec<Traverser<C>>> {
    let mut outputs = Vec::new();
    execute(plan, pool, starts, &mut |traverser| {
        outputs.push(traverser);
        Ok(())
    })?;
    Ok(outputs)
}

/// Splits `items` into at most `parts` contiguous, non-empty partitions.
fn partition<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let size = items.len().div_ceil(parts.max(1)).max(1);
    let mut partitions: Vec<Vec<T>> = Vec::new();
    for item in items {
        match partitions.last_mut() {
            Some(last) if last.len() < size => last.push(item),
            _ => partitions.push(vec![item]),
        }
    }
    partitions
}

struct Run<'p, C: Coefficient> {
    plan: &'p Plan<C>,
    pool: Option<&'p WorkerPool>,
    states: Vec<State<C>>,
}

impl<'p, C: Coefficient> Run<'p, C> {
    fn new(plan: &'p Plan<C>, pool: Option<&'p WorkerPool>) -> Self {
        let states = plan
            .stages()
            .iter()
            .map(|stage| match stage {
                Stage::Reduce { .. } => State::Reduce(None),
                Stage::Barrier { .. } => State::Barrier(None),
                _ => State::Stateless,
            })
            .collect();

        Self { plan, pool, states }
    }

    /// The stage index traversers enter at, and the traversers entering it.
    fn sources(&self, starts: Vec<Traverser<C>>) -> (usize, Box<dyn Iterator<Item = Traverser<C>> + 'p>) {
        let plan = self.plan;
        match plan.source().map(|index| (index, &plan.stages()[index])) {
            Some((index, Stage::Initial { header, function })) => {
                let factory = plan.factory();
                let objects = function
                    .get()
                    .map(move |object| factory.create(header, object));
                (index + 1, Box::new(objects))
            }
            _ => (0, Box::new(starts.into_iter())),
        }
    }

    fn push(&mut self, index: usize, traverser: Traverser<C>, sink: &mut Sink<'_, C>) -> Result<()> {
        let plan = self.plan;
        let Some(stage) = plan.stages().get(index) else {
            return sink(traverser);
        };
        let next = index + 1;

        match stage {
            // upstream of an initial stage is discarded
            Stage::Initial { .. } => Ok(()),
            Stage::Map { header, function } => {
                let object = function.apply(&traverser)?;
                self.push(next, traverser.split(header, object), sink)
            }
            Stage::FlatMap { header, function } => {
                for object in function.apply(&traverser)? {
                    self.push(next, traverser.split(header, object), sink)?;
                }
                Ok(())
            }
            Stage::Filter { function } => {
                if function.test(&traverser)? {
                    self.push(next, traverser, sink)
                } else {
                    Ok(())
                }
            }
            Stage::Reduce { function, .. } => {
                if let State::Reduce(accumulator) = &mut self.states[index] {
                    let current = accumulator
                        .take()
                        .unwrap_or_else(|| function.initial_value());
                    *accumulator = Some(function.apply(&traverser, current)?);
                }
                Ok(())
            }
            Stage::Barrier { function } => {
                if let State::Barrier(barrier) = &mut self.states[index] {
                    let barrier = barrier.get_or_insert_with(|| function.initial_value());
                    function.apply(traverser, barrier)?;
                }
                Ok(())
            }
            Stage::Branch { function, arms } => {
                let routed: Vec<&Plan<C>> = function
                    .route(&traverser)?
                    .into_iter()
                    .filter_map(|compilation| {
                        arms.iter()
                            .find(|(arm, _)| Shared::ptr_eq(arm, compilation))
                            .map(|(_, plan)| plan)
                    })
                    .collect();
                trace!(arms = routed.len(), "branch fan-out");

                for outputs in self.fan_out(&routed, &traverser) {
                    for traverser in outputs? {
                        self.push(next, traverser, sink)?;
                    }
                }
                Ok(())
            }
            Stage::Repeat { head, body, tail } => self.repeat(next, head, body, tail, traverser, sink),
        }
    }

    /// Runs each routed arm on its own clone of `traverser`, in parallel when a pool is bound.
    fn fan_out(&self, arms: &[&Plan<C>], traverser: &Traverser<C>) -> Vec<Result<Vec<Traverser<C>>>> {
        let pool = self.pool;
        match pool {
            Some(workers) if arms.len() > 1 => {
                workers.map_ordered(arms.to_vec(), |arm| collect(arm, pool, vec![traverser.clone()]))
            }
            _ => arms
                .iter()
                .map(|arm| collect(arm, pool, vec![traverser.clone()]))
                .collect(),
        }
    }

    /// Loops one arriving traverser until every copy of it has left the loop.
    fn repeat(
        &mut self,
        next: usize,
        head: &RepeatHead<C>,
        body: &Plan<C>,
        tail: &RepeatTail<C>,
        traverser: Traverser<C>,
        sink: &mut Sink<'_, C>,
    ) -> Result<()> {
        let mut input = TraverserSet::new();
        input.add(traverser);

        while !input.is_empty() {
            let mut batch = Vec::with_capacity(input.len());
            for traverser in input.drain() {
                let route = head.enter(traverser)?;
                if let Some(exit) = route.exit {
                    self.push(next, exit, sink)?;
                }
                batch.extend(route.again);
            }
            if batch.is_empty() {
                break;
            }

            trace!(repeat = ?head.function().id(), batch = batch.len(), "repeat generation");
            for traverser in self.body(body, batch, head.consumers())? {
                let route = tail.leave(traverser)?;
                if let Some(exit) = route.exit {
                    self.push(next, exit, sink)?;
                }
                if let Some(again) = route.again {
                    input.add(again);
                }
            }
        }
        Ok(())
    }

    /// Sends one generation through a repeat body, split across `consumers` workers when
    /// the body treats traversers independently.
    fn body(&self, body: &Plan<C>, batch: Vec<Traverser<C>>, consumers: usize) -> Result<Vec<Traverser<C>>> {
        let pool = match self.pool {
            Some(pool) if consumers > 1 && batch.len() > 1 && body.is_stateless() => pool,
            _ => return collect(body, self.pool, batch),
        };

        let mut outputs = Vec::with_capacity(batch.len());
        for part in pool.map_ordered(partition(batch, consumers), |part| collect(body, Some(pool), part)) {
            outputs.extend(part?);
        }
        Ok(outputs)
    }

    /// Folds the traversers upstream of the reduce at `index` in one partition per worker
    /// and merges the partial accumulators in partition order.
    fn reduce_partitioned(
        &self,
        pool: &WorkerPool,
        start: usize,
        index: usize,
        function: &Shared<dyn ReduceFunction<C>>,
        sources: Vec<Traverser<C>>,
    ) -> Result<Value> {
        let plan = self.plan;
        let partitions = partition(sources, pool.max());
        trace!(partitions = partitions.len(), "partitioned reduce");

        let partials = pool.map_ordered(partitions, |part| -> Result<Value> {
            let mut run = Run::new(plan, Some(pool));
            // stages ahead of the reduce are stateless and never reach the sink
            let mut discard = |_: Traverser<C>| -> Result<()> { Ok(()) };
            for traverser in part {
                run.push(start, traverser, &mut discard)?;
            }
            Ok(run.accumulator(index, function))
        });

        partials
            .into_iter()
            .try_fold(function.initial_value(), |merged, partial| {
                function.merge(merged, partial?)
            })
    }

    fn accumulator(&mut self, index: usize, function: &Shared<dyn ReduceFunction<C>>) -> Value {
        let accumulator = match &mut self.states[index] {
            State::Reduce(accumulator) => accumulator.take(),
            _ => None,
        };
        accumulator.unwrap_or_else(|| function.initial_value())
    }

    /// Flushes every reduce and barrier from `start` on, in stage order.
    fn complete(&mut self, start: usize, sink: &mut Sink<'_, C>) -> Result<()> {
        let plan = self.plan;
        for (index, stage) in plan.stages().iter().enumerate().skip(start) {
            match stage {
                Stage::Reduce { header, function } => {
                    let accumulator = self.accumulator(index, function);
                    self.push(index + 1, plan.factory().create(header, accumulator), sink)?;
                }
                Stage::Barrier { function } => {
                    let barrier = match &mut self.states[index] {
                        State::Barrier(barrier) => barrier.take(),
                        _ => None,
                    }
                    .unwrap_or_else(|| function.initial_value());
                    for traverser in function.emit(barrier)? {
                        self.push(index + 1, traverser, sink)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::even(vec![1, 2, 3, 4], 2, vec![vec![1, 2], vec![3, 4]])]
    #[case::uneven(vec![1, 2, 3, 4, 5], 2, vec![vec![1, 2, 3], vec![4, 5]])]
    #[case::more_parts_than_items(vec![1, 2], 4, vec![vec![1], vec![2]])]
    #[case::empty(Vec::new(), 3, Vec::new())]
    #[case::zero_parts(vec![1, 2], 0, vec![vec![1, 2]])]
    fn test_partition(#[case] items: Vec<i32>, #[case] parts: usize, #[case] expected: Vec<Vec<i32>>) {
        assert_eq!(partition(items, parts), expected);
    }
}
