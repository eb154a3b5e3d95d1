//! Execution contracts implemented by the processor crates.

use std::fmt::Debug;

use crate::{
    Coefficient, Result, Shared, compiler::BytecodeCompiler, compiler::Compilation,
    strategy::Strategy, traverser::Traverser,
};

/// Stream of results produced by a processor. Errors are yielded in place of traversers.
pub type TraverserIter<C> = Box<dyn Iterator<Item = Result<Traverser<C>>> + Send>;

/// A runnable pipeline minted from one [`Compilation`].
pub trait Processor<C: Coefficient>: Debug + Send + Sync {
    /// Runs the pipeline. `starts` seeds the first function; a pipeline beginning with an
    /// initial function is usually run with no starts.
    fn iterator(&self, starts: Vec<Traverser<C>>) -> TraverserIter<C>;
}

pub trait ProcessorFactory<C: Coefficient>: Debug + Send + Sync {
    fn mint(&self, compilation: &Compilation<C>) -> Result<Box<dyn Processor<C>>>;

    fn strategies(&self) -> Vec<Shared<dyn Strategy<C>>> {
        Vec::new()
    }

    fn compilers(&self) -> Vec<Shared<dyn BytecodeCompiler<C>>> {
        Vec::new()
    }
}
