//! An in-memory backing structure of named value collections.
//!
//! ```text
//! db().values("people")  ->  every value of the "people" collection
//! ```

use std::any::Any;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::{
    Coefficient, Error, Result, Shared, Value,
    bytecode::{Arg, Instruction},
    compiler::{BytecodeCompiler, CompileContext},
    function::{CFunction, FlatMapFunction, FunctionHeader, FunctionKind},
    strategy::{DbStrategy, Strategy},
    structure::{Structure, StructureFactory, StructureHandle},
    traverser::Traverser,
};

pub const VALUES: &str = "values";

type Collections = FxHashMap<SmolStr, Vec<Value>>;

#[derive(Debug)]
pub struct MemoryStructure {
    collections: Shared<Collections>,
}

impl MemoryStructure {
    pub fn values(&self, collection: &str) -> Option<&[Value]> {
        self.collections.get(collection).map(Vec::as_slice)
    }
}

impl Structure for MemoryStructure {
    fn name(&self) -> &str {
        "memory"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Mints [`MemoryStructure`]s sharing one immutable set of collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryStructureFactory {
    collections: Shared<Collections>,
}

impl MemoryStructureFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(
        mut self,
        name: impl Into<SmolStr>,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        Shared::make_mut(&mut self.collections).insert(name.into(), values.into_iter().collect());
        self
    }
}

impl<C: Coefficient> StructureFactory<C> for MemoryStructureFactory {
    fn mint(&self) -> Result<StructureHandle> {
        Ok(StructureHandle::new(MemoryStructure {
            collections: Shared::clone(&self.collections),
        }))
    }

    fn strategies(&self) -> Vec<Shared<dyn Strategy<C>>> {
        vec![Shared::new(DbStrategy)]
    }

    fn compilers(&self) -> Vec<Shared<dyn BytecodeCompiler<C>>> {
        vec![Shared::new(MemoryCompiler)]
    }
}

/// Compiles the ops contributed by the in-memory structure.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryCompiler;

impl<C: Coefficient> BytecodeCompiler<C> for MemoryCompiler {
    fn name(&self) -> &str {
        "memory"
    }

    fn compile(
        &self,
        instruction: &Instruction<C>,
        _cx: &CompileContext<'_, C>,
    ) -> Result<Option<CFunction<C>>> {
        if instruction.op() != VALUES {
            return Ok(None);
        }
        let collection = match instruction.args() {
            [arg] => arg.as_str().map(SmolStr::from),
            _ => None,
        }
        .ok_or_else(|| Error::invalid_arguments(VALUES, "expected a collection name"))?;

        Ok(Some(CFunction::new(
            FunctionHeader::from_instruction(instruction),
            FunctionKind::FlatMap(Shared::new(ValuesFlatMap { collection })),
        )))
    }
}

/// Expands a minted memory structure into the values of one collection.
#[derive(Debug)]
pub struct ValuesFlatMap {
    collection: SmolStr,
}

impl<C: Coefficient> FlatMapFunction<C> for ValuesFlatMap {
    fn apply(&self, traverser: &Traverser<C>) -> Result<Vec<Value>> {
        let structure = match traverser.object() {
            Value::Structure(handle) => handle.downcast_ref::<MemoryStructure>(),
            _ => None,
        }
        .ok_or_else(|| Error::invalid_types(VALUES, traverser.object()))?;

        Ok(structure
            .values(&self.collection)
            .map(<[Value]>::to_vec)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LongCoefficient, Program, strategy::StrategyKind, symbol};

    type P = Program<LongCoefficient>;

    fn program_with_db(bound: bool) -> P {
        let mut program = P::new();
        let root = program.root();
        if bound {
            program.sources_mut().structure = Some(Shared::new(
                MemoryStructureFactory::new().with_collection("people", ["marko".into(), "josh".into()]),
            ));
        }
        program.add_instruction(root, Instruction::new(symbol::DB, []));
        program.add_instruction(root, Instruction::new(VALUES, [Arg::from("people")]));
        program
    }

    #[test]
    fn test_db_strategy_binds_once() {
        let mut program = program_with_db(true);
        let root = program.root();
        assert_eq!(Strategy::<LongCoefficient>::kind(&DbStrategy), StrategyKind::Provider);

        assert!(DbStrategy.apply(&mut program, root).is_ok());
        let bound = program.get(root).instructions()[0].clone();
        assert!(matches!(bound.arg(0), Some(Arg::Value(Value::Structure(_)))));

        assert!(DbStrategy.apply(&mut program, root).is_ok());
        assert_eq!(program.get(root).instructions()[0], bound);
    }

    #[test]
    fn test_db_strategy_without_factory() {
        let mut program = program_with_db(false);
        let root = program.root();
        assert_eq!(DbStrategy.apply(&mut program, root), Err(Error::NoStructureFactory));
    }

    #[test]
    fn test_nested_db_resolves_root_factory() {
        let mut program = program_with_db(true);
        let root = program.root();
        let child = program.add_child(root);
        program.add_instruction(child, Instruction::new(symbol::DB, []));

        assert!(DbStrategy.apply(&mut program, child).is_ok());
        assert!(program.get(child).instructions()[0].arg(0).is_some());
    }

    #[test]
    fn test_minted_structures_share_collections() {
        let factory = MemoryStructureFactory::new()
            .with_collection("n", [1.into(), 2.into()]);
        let handle = StructureFactory::<LongCoefficient>::mint(&factory);
        let values = handle
            .as_ref()
            .ok()
            .and_then(|h| h.downcast_ref::<MemoryStructure>())
            .and_then(|s| s.values("n").map(<[Value]>::to_vec));
        assert_eq!(values, Some(vec![Value::Int(1), Value::Int(2)]));
    }
}
