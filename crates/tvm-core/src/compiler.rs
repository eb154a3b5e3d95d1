//! Translation of a [`Program`] into a [`Compilation`].

pub mod builtin;
pub mod compilation;

use std::{cell::Cell, fmt::Debug};

use tracing::debug;

use crate::{
    Coefficient, Error, Result, Shared, symbol,
    bytecode::{Arg, BytecodeId, Instruction, Program},
    function::CFunction,
    processor::ProcessorFactory,
    traverser::{RepeatId, TraverserFactory},
};

pub use builtin::CoreCompiler;
pub use compilation::{Compilation, CompilationCircle};

/// Resolves instructions into functions.
///
/// A compiler returns `Ok(None)` for ops it does not know, letting the next
/// registered compiler try.
pub trait BytecodeCompiler<C: Coefficient>: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn compile(
        &self,
        instruction: &Instruction<C>,
        cx: &CompileContext<'_, C>,
    ) -> Result<Option<CFunction<C>>>;
}

/// State shared by every compiler while one program is compiled.
pub struct CompileContext<'a, C: Coefficient> {
    program: &'a Program<C>,
    compilers: &'a [Shared<dyn BytecodeCompiler<C>>],
    traverser_factory: TraverserFactory,
    processor_factory: Shared<dyn ProcessorFactory<C>>,
    repeat_ids: Cell<u32>,
}

impl<'a, C: Coefficient> CompileContext<'a, C> {
    pub fn program(&self) -> &'a Program<C> {
        self.program
    }

    pub fn traverser_factory(&self) -> TraverserFactory {
        self.traverser_factory
    }

    /// Hands out a compile-unique id for a repeat branch.
    pub fn next_repeat_id(&self) -> RepeatId {
        let id = self.repeat_ids.get();
        self.repeat_ids.set(id + 1);
        RepeatId(id)
    }

    /// Compiles the nested bytecode referenced by `arg` of an `op` instruction.
    pub fn nested(&self, op: &str, arg: &Arg<C>) -> Result<Shared<Compilation<C>>> {
        let id = arg
            .as_bytecode()
            .ok_or_else(|| Error::invalid_arguments(op, format!("expected a bytecode, got {:?}", arg)))?;
        self.compile_bytecode(id, true).map(Shared::new)
    }

    fn compile_bytecode(&self, id: BytecodeId<C>, nested: bool) -> Result<Compilation<C>> {
        let functions = self
            .program
            .get(id)
            .instructions()
            .iter()
            .map(|instruction| self.compile_instruction(instruction))
            .collect::<Result<Vec<_>>>()?;

        Ok(Compilation::new(
            functions,
            self.traverser_factory,
            Shared::clone(&self.processor_factory),
            nested,
        )
        .with_id(self.program.sources().id.clone()))
    }

    fn compile_instruction(&self, instruction: &Instruction<C>) -> Result<CFunction<C>> {
        for compiler in self.compilers {
            if let Some(function) = compiler.compile(instruction, self)? {
                return Ok(function);
            }
        }
        Err(Error::UnresolvedOp(instruction.op().into()))
    }
}

/// Queries its compilers in registration order until one resolves each op.
#[derive(Debug, Clone)]
pub struct Compiler<C: Coefficient> {
    compilers: Vec<Shared<dyn BytecodeCompiler<C>>>,
}

impl<C: Coefficient> Compiler<C> {
    pub fn new(compilers: Vec<Shared<dyn BytecodeCompiler<C>>>) -> Self {
        Self { compilers }
    }

    /// Compiles the root bytecode of `program` and every bytecode nested in its args.
    ///
    /// # Arguments
    ///
    /// * `program` - The rewritten program to compile
    /// * `processor_factory` - Factory that mints processors for the root and nested compilations
    ///
    /// # Returns
    ///
    /// The root [`Compilation`], or [`Error::UnresolvedOp`] naming the first op no compiler recognized.
    pub fn compile(
        &self,
        program: &Program<C>,
        processor_factory: Shared<dyn ProcessorFactory<C>>,
    ) -> Result<Compilation<C>> {
        let traverser_factory = if program
            .any_instruction(|instruction| instruction.label().is_some() || instruction.op() == symbol::PATH)
        {
            TraverserFactory::Cop
        } else {
            TraverserFactory::Co
        };

        let cx = CompileContext {
            program,
            compilers: &self.compilers,
            traverser_factory,
            processor_factory,
            repeat_ids: Cell::new(0),
        };
        let compilation = cx.compile_bytecode(program.root(), false)?;

        debug!(
            functions = compilation.functions().len(),
            traverser_factory = ?traverser_factory,
            compilers = ?self.compilers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            "compiled program"
        );
        Ok(compilation)
    }
}
