//! The push graph a compilation is translated into once, then replayed per execution.

use tvm_core::{
    Coefficient, Compilation, FunctionHeader, FunctionKind, Result, Shared, Traverser,
    TraverserFactory,
    function::{
        BarrierFunction, BranchFunction, FilterFunction, FlatMapFunction, InitialFunction,
        MapFunction, ReduceFunction, RepeatBranch, RepeatRoute,
    },
};

#[derive(Debug)]
pub(crate) enum Stage<C: Coefficient> {
    Initial {
        header: FunctionHeader<C>,
        function: Shared<dyn InitialFunction>,
    },
    Map {
        header: FunctionHeader<C>,
        function: Shared<dyn MapFunction<C>>,
    },
    FlatMap {
        header: FunctionHeader<C>,
        function: Shared<dyn FlatMapFunction<C>>,
    },
    Filter {
        function: Shared<dyn FilterFunction<C>>,
    },
    Reduce {
        header: FunctionHeader<C>,
        function: Shared<dyn ReduceFunction<C>>,
    },
    Barrier {
        function: Shared<dyn BarrierFunction<C>>,
    },
    Branch {
        function: Shared<BranchFunction<C>>,
        arms: Vec<(Shared<Compilation<C>>, Plan<C>)>,
    },
    Repeat {
        head: RepeatHead<C>,
        body: Plan<C>,
        tail: RepeatTail<C>,
    },
}

impl<C: Coefficient> Stage<C> {
    /// Stages that hold no state across traversers.
    fn is_stateless(&self) -> bool {
        !matches!(
            self,
            Stage::Initial { .. } | Stage::Reduce { .. } | Stage::Barrier { .. }
        )
    }
}

/// Entry junction of a repeat loop. Fresh and requeued traversers pass through it,
/// leaving the loop or feeding the body.
#[derive(Debug)]
pub(crate) struct RepeatHead<C: Coefficient> {
    function: Shared<RepeatBranch<C>>,
    consumers: usize,
}

impl<C: Coefficient> RepeatHead<C> {
    pub(crate) fn enter(&self, traverser: Traverser<C>) -> Result<RepeatRoute<C>> {
        self.function.before(traverser)
    }

    /// How many sub-streams the body is fed through; one per branch in the body, at least one.
    pub(crate) fn consumers(&self) -> usize {
        self.consumers
    }

    pub(crate) fn function(&self) -> &RepeatBranch<C> {
        &self.function
    }
}

/// Exit junction of a repeat loop, closing one pass through the body.
#[derive(Debug)]
pub(crate) struct RepeatTail<C: Coefficient> {
    function: Shared<RepeatBranch<C>>,
}

impl<C: Coefficient> RepeatTail<C> {
    pub(crate) fn leave(&self, traverser: Traverser<C>) -> Result<RepeatRoute<C>> {
        self.function.after(traverser)
    }
}

/// A compiled chain of stages.
#[derive(Debug)]
pub struct Plan<C: Coefficient> {
    stages: Vec<Stage<C>>,
    factory: TraverserFactory,
}

impl<C: Coefficient> Plan<C> {
    pub fn build(compilation: &Compilation<C>) -> Self {
        let stages = compilation
            .functions()
            .iter()
            .map(|function| Self::stage(function.header().clone(), function.kind()))
            .collect();

        Self {
            stages,
            factory: compilation.traverser_factory(),
        }
    }

    fn stage(header: FunctionHeader<C>, kind: &FunctionKind<C>) -> Stage<C> {
        match kind {
            FunctionKind::Initial(function) => Stage::Initial {
                header,
                function: Shared::clone(function),
            },
            FunctionKind::Map(function) => Stage::Map {
                header,
                function: Shared::clone(function),
            },
            FunctionKind::FlatMap(function) => Stage::FlatMap {
                header,
                function: Shared::clone(function),
            },
            FunctionKind::Filter(function) => Stage::Filter {
                function: Shared::clone(function),
            },
            FunctionKind::Reduce(function) => Stage::Reduce {
                header,
                function: Shared::clone(function),
            },
            FunctionKind::Barrier(function) => Stage::Barrier {
                function: Shared::clone(function),
            },
            FunctionKind::Branch(function) => Stage::Branch {
                function: Shared::clone(function),
                arms: function
                    .compilations()
                    .map(|compilation| (Shared::clone(compilation), Plan::build(compilation)))
                    .collect(),
            },
            FunctionKind::Repeat(function) => Stage::Repeat {
                head: RepeatHead {
                    function: Shared::clone(function),
                    consumers: count_branches(function.body()).max(1),
                },
                body: Plan::build(function.body()),
                tail: RepeatTail {
                    function: Shared::clone(function),
                },
            },
        }
    }

    pub(crate) fn stages(&self) -> &[Stage<C>] {
        &self.stages
    }

    pub(crate) fn factory(&self) -> TraverserFactory {
        self.factory
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Index of the stage a run starts at: the last initial stage, whose objects replace
    /// everything upstream of it.
    pub(crate) fn source(&self) -> Option<usize> {
        self.stages
            .iter()
            .rposition(|stage| matches!(stage, Stage::Initial { .. }))
    }

    /// Whether each traverser can be processed independently of every other one.
    pub fn is_stateless(&self) -> bool {
        self.stages.iter().all(Stage::is_stateless)
    }

    /// The first reduce, with its index, when every stage between the source and it is stateless.
    pub(crate) fn partitionable_reduce(&self) -> Option<(usize, &Shared<dyn ReduceFunction<C>>)> {
        let start = self.source().map_or(0, |source| source + 1);
        let index = start
            + self.stages[start..]
                .iter()
                .position(|stage| !stage.is_stateless())?;
        match &self.stages[index] {
            Stage::Reduce { function, .. } => Some((index, function)),
            _ => None,
        }
    }
}

/// Counts the sub-compilations of every branch in `compilation`, nested branches included.
pub(crate) fn count_branches<C: Coefficient>(compilation: &Compilation<C>) -> usize {
    compilation
        .functions()
        .iter()
        .map(|function| match function.kind() {
            FunctionKind::Branch(branch) => branch
                .compilations()
                .map(|compilation| 1 + count_branches(compilation))
                .sum(),
            _ => 0,
        })
        .sum()
}
