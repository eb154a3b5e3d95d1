//! The executable units a [`Compilation`](crate::Compilation) is made of.
//!
//! Every compiled instruction becomes exactly one [`CFunction`]: a [`FunctionHeader`]
//! carrying the instruction's coefficient and label, plus one [`FunctionKind`]
//! variant. Processors dispatch on the variant with an exhaustive `match`.

pub mod barrier;
pub mod branch;
pub mod filter;
pub mod flat_map;
pub mod initial;
pub mod map;
pub mod reduce;

use std::fmt::{self, Debug, Display, Formatter};

use smol_str::SmolStr;

use crate::{
    Coefficient, Result, Shared, Value,
    bytecode::Instruction,
    traverser::{Traverser, TraverserSet},
};

pub use branch::{Branch, BranchFunction, Location, RepeatBranch, RepeatRoute};

/// The op, label and coefficient of the instruction a function was compiled from.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionHeader<C: Coefficient> {
    op: SmolStr,
    label: Option<SmolStr>,
    coefficient: C,
}

impl<C: Coefficient> FunctionHeader<C> {
    pub fn new(op: impl Into<SmolStr>, label: Option<SmolStr>, coefficient: C) -> Self {
        Self {
            op: op.into(),
            label,
            coefficient,
        }
    }

    pub fn from_instruction(instruction: &Instruction<C>) -> Self {
        Self::new(
            instruction.op(),
            instruction.label().cloned(),
            instruction.coefficient().clone(),
        )
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn label(&self) -> Option<&SmolStr> {
        self.label.as_ref()
    }

    pub fn coefficient(&self) -> &C {
        &self.coefficient
    }
}

/// Produces the seed objects of a pipeline.
pub trait InitialFunction: Debug + Send + Sync {
    fn get(&self) -> Box<dyn Iterator<Item = Value> + Send>;
}

/// One-to-one transformation.
pub trait MapFunction<C: Coefficient>: Debug + Send + Sync {
    fn apply(&self, traverser: &Traverser<C>) -> Result<Value>;
}

/// One-to-many transformation.
pub trait FlatMapFunction<C: Coefficient>: Debug + Send + Sync {
    fn apply(&self, traverser: &Traverser<C>) -> Result<Vec<Value>>;
}

pub trait FilterFunction<C: Coefficient>: Debug + Send + Sync {
    fn test(&self, traverser: &Traverser<C>) -> Result<bool>;
}

/// Folds a whole stream into a single value.
///
/// `merge` combines two partial accumulators and must be associative, since parallel
/// processors reduce partitions independently.
pub trait ReduceFunction<C: Coefficient>: Debug + Send + Sync {
    fn initial_value(&self) -> Value;

    fn apply(&self, traverser: &Traverser<C>, accumulator: Value) -> Result<Value>;

    fn merge(&self, left: Value, right: Value) -> Result<Value>;
}

/// Drains a whole stream of traversers before emitting any of them.
pub trait BarrierFunction<C: Coefficient>: Debug + Send + Sync {
    fn initial_value(&self) -> TraverserSet<C> {
        TraverserSet::new()
    }

    fn apply(&self, traverser: Traverser<C>, barrier: &mut TraverserSet<C>) -> Result<()> {
        barrier.add(traverser);
        Ok(())
    }

    fn emit(&self, barrier: TraverserSet<C>) -> Result<Vec<Traverser<C>>>;
}

/// The closed set of function capabilities.
#[derive(Debug, Clone)]
pub enum FunctionKind<C: Coefficient> {
    Initial(Shared<dyn InitialFunction>),
    Map(Shared<dyn MapFunction<C>>),
    FlatMap(Shared<dyn FlatMapFunction<C>>),
    Filter(Shared<dyn FilterFunction<C>>),
    Reduce(Shared<dyn ReduceFunction<C>>),
    Barrier(Shared<dyn BarrierFunction<C>>),
    Branch(Shared<BranchFunction<C>>),
    Repeat(Shared<RepeatBranch<C>>),
}

impl<C: Coefficient> FunctionKind<C> {
    pub fn name(&self) -> &'static str {
        match self {
            FunctionKind::Initial(_) => "initial",
            FunctionKind::Map(_) => "map",
            FunctionKind::FlatMap(_) => "flat_map",
            FunctionKind::Filter(_) => "filter",
            FunctionKind::Reduce(_) => "reduce",
            FunctionKind::Barrier(_) => "barrier",
            FunctionKind::Branch(_) => "branch",
            FunctionKind::Repeat(_) => "repeat",
        }
    }
}

/// A compiled instruction.
#[derive(Debug, Clone)]
pub struct CFunction<C: Coefficient> {
    header: FunctionHeader<C>,
    kind: FunctionKind<C>,
}

impl<C: Coefficient> CFunction<C> {
    pub fn new(header: FunctionHeader<C>, kind: FunctionKind<C>) -> Self {
        Self { header, kind }
    }

    pub fn header(&self) -> &FunctionHeader<C> {
        &self.header
    }

    pub fn kind(&self) -> &FunctionKind<C> {
        &self.kind
    }
}

impl<C: Coefficient> Display for CFunction<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.header.op, self.kind.name())?;
        if let Some(label) = &self.header.label {
            write!(f, "@{}", label)?;
        }
        Ok(())
    }
}
