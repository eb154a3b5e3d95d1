use crate::{
    Coefficient, Result, Shared, Value,
    bytecode::Instruction,
    compiler::CompileContext,
    function::{FlatMapFunction, FunctionKind},
    traverser::Traverser,
};

/// Splits a list into its items and a map into single-entry maps. Other objects pass through.
#[derive(Debug)]
pub struct UnfoldFlatMap;

impl UnfoldFlatMap {
    pub(crate) fn compile<C: Coefficient>(
        _instruction: &Instruction<C>,
        _cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        Ok(FunctionKind::FlatMap(Shared::new(Self)))
    }
}

impl<C: Coefficient> FlatMapFunction<C> for UnfoldFlatMap {
    fn apply(&self, traverser: &Traverser<C>) -> Result<Vec<Value>> {
        Ok(match traverser.object() {
            Value::List(items) => items.clone(),
            Value::Map(tuple) => tuple
                .entries()
                .map(|(k, v)| Value::Map([(k.clone(), v.clone())].into_iter().collect()))
                .collect(),
            other => vec![other.clone()],
        })
    }
}
