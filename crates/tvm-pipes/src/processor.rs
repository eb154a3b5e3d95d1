use tracing::debug;
use tvm_core::{
    CFunction, Coefficient, Compilation, Processor, ProcessorFactory, Result, Traverser,
    TraverserFactory, TraverserIter,
};

use crate::pipeline::Pipeline;

/// Runs a compilation as a single-threaded pull [`Pipeline`].
#[derive(Debug)]
pub struct PipesProcessor<C: Coefficient> {
    functions: Vec<CFunction<C>>,
    factory: TraverserFactory,
}

impl<C: Coefficient> PipesProcessor<C> {
    pub fn new(compilation: &Compilation<C>) -> Self {
        Self {
            functions: compilation.functions().to_vec(),
            factory: compilation.traverser_factory(),
        }
    }

    pub fn pipeline(&self, starts: Vec<Traverser<C>>) -> Pipeline<C> {
        Pipeline::new(&self.functions, self.factory, starts)
    }
}

impl<C: Coefficient> Processor<C> for PipesProcessor<C> {
    fn iterator(&self, starts: Vec<Traverser<C>>) -> TraverserIter<C> {
        Box::new(self.pipeline(starts))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PipesProcessorFactory;

impl<C: Coefficient> ProcessorFactory<C> for PipesProcessorFactory {
    fn mint(&self, compilation: &Compilation<C>) -> Result<Box<dyn Processor<C>>> {
        debug!(compilation = ?compilation, "minting pipes processor");
        Ok(Box::new(PipesProcessor::new(compilation)))
    }
}
