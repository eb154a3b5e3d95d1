//! The core op set.

use std::fmt::{self, Debug, Formatter};

use rustc_hash::FxHashMap;

use crate::{
    Coefficient, Result, symbol,
    bytecode::Instruction,
    compiler::{BytecodeCompiler, CompileContext},
    function::{
        BranchFunction, CFunction, FunctionHeader, FunctionKind, RepeatBranch,
        barrier::{DedupBarrier, OrderBarrier},
        filter::{BytecodeFilter, IsFilter},
        flat_map::UnfoldFlatMap,
        initial::{DbInitial, InjectInitial},
        map,
        reduce::{CountReduce, GroupCountReduce, SumReduce},
    },
};

type CompileFn<C> = fn(&Instruction<C>, &CompileContext<'_, C>) -> Result<FunctionKind<C>>;

/// Resolves every core op through a name-keyed registry.
pub struct CoreCompiler<C: Coefficient> {
    registry: FxHashMap<&'static str, CompileFn<C>>,
}

impl<C: Coefficient> Default for CoreCompiler<C> {
    fn default() -> Self {
        let mut registry: FxHashMap<&'static str, CompileFn<C>> = FxHashMap::default();

        registry.insert(symbol::INJECT, InjectInitial::compile);
        registry.insert(symbol::DB, DbInitial::compile);

        registry.insert(symbol::MAP, map::compile_map);
        registry.insert(symbol::INCR, map::compile_incr);
        registry.insert(symbol::CONSTANT, map::compile_constant);
        registry.insert(symbol::LOOPS, map::compile_loops);
        registry.insert(symbol::PATH, map::compile_path);

        registry.insert(symbol::FILTER, BytecodeFilter::compile);
        registry.insert(symbol::IS, IsFilter::compile);

        registry.insert(symbol::UNFOLD, UnfoldFlatMap::compile);

        registry.insert(symbol::COUNT, CountReduce::compile);
        registry.insert(symbol::SUM, SumReduce::compile);
        registry.insert(symbol::GROUP_COUNT, GroupCountReduce::compile);

        registry.insert(symbol::DEDUP, DedupBarrier::compile);
        registry.insert(symbol::ORDER, OrderBarrier::compile);

        registry.insert(symbol::UNION, BranchFunction::compile_union);
        registry.insert(symbol::CHOOSE, BranchFunction::compile_choose);
        registry.insert(symbol::REPEAT, RepeatBranch::compile);

        Self { registry }
    }
}

impl<C: Coefficient> CoreCompiler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registry.keys().copied()
    }
}

impl<C: Coefficient> Debug for CoreCompiler<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreCompiler")
            .field("ops", &self.registry.len())
            .finish()
    }
}

impl<C: Coefficient> BytecodeCompiler<C> for CoreCompiler<C> {
    fn name(&self) -> &str {
        "core"
    }

    fn compile(
        &self,
        instruction: &Instruction<C>,
        cx: &CompileContext<'_, C>,
    ) -> Result<Option<CFunction<C>>> {
        match self.registry.get(instruction.op()) {
            Some(compile) => Ok(Some(CFunction::new(
                FunctionHeader::from_instruction(instruction),
                compile(instruction, cx)?,
            ))),
            None => Ok(None),
        }
    }
}
