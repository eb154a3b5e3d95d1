use tracing::debug;

use crate::{
    Coefficient, Error, Result, Shared,
    bytecode::Program,
    compiler::{BytecodeCompiler, Compilation, Compiler, CoreCompiler},
    processor::{ProcessorFactory, TraverserIter},
    strategy::{IdentityStrategy, Strategies, Strategy},
};

#[derive(Debug, Clone)]
pub struct Options {
    /// Run optimization strategies. Provider strategies always run.
    pub optimize: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { optimize: true }
    }
}

/// Rewrites, compiles and runs programs.
///
/// Strategies and compilers are gathered per submission from the machine, the
/// program's root sources, its structure factory and its processor factory.
#[derive(Debug, Clone)]
pub struct Machine<C: Coefficient> {
    pub(crate) options: Options,
    processor: Option<Shared<dyn ProcessorFactory<C>>>,
    strategies: Strategies<C>,
}

impl<C: Coefficient> Default for Machine<C> {
    fn default() -> Self {
        let mut strategies = Strategies::new();
        strategies.add(Shared::new(IdentityStrategy));

        Self {
            options: Options::default(),
            processor: None,
            strategies,
        }
    }
}

impl<C: Coefficient> Machine<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processor factory used when a program does not bind its own.
    pub fn with_processor(mut self, processor: Shared<dyn ProcessorFactory<C>>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn with_strategy(mut self, strategy: Shared<dyn Strategy<C>>) -> Self {
        self.strategies.add(strategy);
        self
    }

    pub fn set_optimize(&mut self, optimize: bool) {
        self.options.optimize = optimize;
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Applies every strategy to `program` in place and compiles the result.
    pub fn compile(&self, program: &mut Program<C>) -> Result<Compilation<C>> {
        let sources = program.sources().clone();
        let processor = sources
            .processor
            .clone()
            .or_else(|| self.processor.clone())
            .ok_or(Error::NoProcessorFactory)?;

        let mut strategies = self.strategies.clone();
        strategies.extend(sources.strategies.iter().cloned());
        if let Some(structure) = &sources.structure {
            strategies.extend(structure.strategies());
        }
        strategies.extend(processor.strategies());
        strategies.apply(program, self.options.optimize)?;
        debug!(program = %program, strategies = strategies.len(), "rewrote program");

        let mut compilers: Vec<Shared<dyn BytecodeCompiler<C>>> = sources.compilers.clone();
        if let Some(structure) = &sources.structure {
            compilers.extend(structure.compilers());
        }
        compilers.extend(processor.compilers());
        compilers.push(Shared::new(CoreCompiler::new()));

        Compiler::new(compilers).compile(program, processor)
    }

    /// Compiles `program` and mints a fresh processor to run it.
    pub fn submit(&self, mut program: Program<C>) -> Result<TraverserIter<C>> {
        let compilation = self.compile(&mut program)?;
        let processor = compilation.processor_factory().mint(&compilation)?;
        debug!(processor = ?processor, "minted processor");
        Ok(processor.iterator(Vec::new()))
    }
}
