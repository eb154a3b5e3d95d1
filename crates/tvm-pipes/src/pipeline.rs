use tvm_core::{CFunction, Coefficient, FunctionKind, Result, Traverser, TraverserFactory};

use crate::{
    branch::BranchStep,
    repeat::RepeatStep,
    step::{Staged, Step, Upstream},
    steps::{BarrierStep, FilterStep, FlatMapStep, InitialStep, MapStep, ReduceStep, StartStep},
};

/// A lazily pulled chain of steps, one per compiled function.
///
/// Step `0` feeds the start traversers; a leading initial function ignores them.
pub struct Pipeline<C: Coefficient> {
    steps: Vec<Box<dyn Step<C>>>,
}

impl<C: Coefficient> Pipeline<C> {
    pub fn new(
        functions: &[CFunction<C>],
        factory: TraverserFactory,
        starts: Vec<Traverser<C>>,
    ) -> Self {
        let mut steps: Vec<Box<dyn Step<C>>> = Vec::with_capacity(functions.len() + 1);
        steps.push(Staged::boxed(StartStep::new(starts)));

        for function in functions {
            let header = function.header().clone();
            let step = match function.kind() {
                FunctionKind::Initial(f) => Staged::boxed(InitialStep::new(header, f.clone(), factory)),
                FunctionKind::Map(f) => Staged::boxed(MapStep::new(header, f.clone())),
                FunctionKind::FlatMap(f) => Staged::boxed(FlatMapStep::new(header, f.clone())),
                FunctionKind::Filter(f) => Staged::boxed(FilterStep::new(f.clone())),
                FunctionKind::Reduce(f) => Staged::boxed(ReduceStep::new(header, f.clone(), factory)),
                FunctionKind::Barrier(f) => Staged::boxed(BarrierStep::new(f.clone())),
                FunctionKind::Branch(f) => Staged::boxed(BranchStep::new(f.clone())),
                FunctionKind::Repeat(f) => Staged::boxed(RepeatStep::new(f.clone())),
            };
            steps.push(step);
        }

        Self { steps }
    }

    pub fn has_next(&mut self) -> bool {
        Upstream::new(&mut self.steps).has_next()
    }

    /// Drops everything staged in every step.
    pub fn reset(&mut self) {
        self.steps.iter_mut().for_each(|step| step.reset());
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<C: Coefficient> Iterator for Pipeline<C> {
    type Item = Result<Traverser<C>>;

    fn next(&mut self) -> Option<Self::Item> {
        Upstream::new(&mut self.steps).next()
    }
}
