use rustc_hash::FxHashSet;

use crate::{
    Coefficient, Error, Result, Shared, Value,
    bytecode::{Arg, Instruction},
    compiler::CompileContext,
    function::{BarrierFunction, FunctionKind},
    traverser::{Traverser, TraverserSet},
};

/// Keeps the first traverser seen for each distinct object, with its coefficient reset.
#[derive(Debug)]
pub struct DedupBarrier;

impl DedupBarrier {
    pub(crate) fn compile<C: Coefficient>(
        _instruction: &Instruction<C>,
        _cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        Ok(FunctionKind::Barrier(Shared::new(Self)))
    }
}

impl<C: Coefficient> BarrierFunction<C> for DedupBarrier {
    fn emit(&self, barrier: TraverserSet<C>) -> Result<Vec<Traverser<C>>> {
        let mut seen: FxHashSet<Value> = FxHashSet::default();
        Ok(barrier
            .into_iter()
            .filter(|traverser| seen.insert(traverser.object().clone()))
            .map(|traverser| traverser.with_coefficient(C::one()))
            .collect())
    }
}

/// Sorts the drained traversers by object. Ties keep arrival order.
#[derive(Debug)]
pub struct OrderBarrier {
    descending: bool,
}

impl OrderBarrier {
    pub(crate) fn compile<C: Coefficient>(
        instruction: &Instruction<C>,
        _cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        let descending = match instruction.args() {
            [] => false,
            [arg] => match arg.as_str() {
                Some("asc") => false,
                Some("desc") => true,
                _ => {
                    return Err(Error::invalid_arguments(
                        instruction.op(),
                        format!("expected \"asc\" or \"desc\", got {:?}", arg_display(arg)),
                    ));
                }
            },
            _ => return Err(Error::invalid_arguments(instruction.op(), "expected at most one argument")),
        };
        Ok(FunctionKind::Barrier(Shared::new(Self { descending })))
    }
}

fn arg_display<C: Coefficient>(arg: &Arg<C>) -> String {
    match arg {
        Arg::Value(value) => value.to_string(),
        Arg::Bytecode(id) => format!("{:?}", id),
    }
}

impl<C: Coefficient> BarrierFunction<C> for OrderBarrier {
    fn emit(&self, barrier: TraverserSet<C>) -> Result<Vec<Traverser<C>>> {
        let mut traversers: Vec<Traverser<C>> = barrier.into_iter().collect();
        if self.descending {
            traversers.sort_by(|a, b| b.object().cmp(a.object()));
        } else {
            traversers.sort_by(|a, b| a.object().cmp(b.object()));
        }
        Ok(traversers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LongCoefficient, function::FunctionHeader, symbol, traverser::TraverserFactory};

    fn set(objects: &[(i64, u64)]) -> TraverserSet<LongCoefficient> {
        objects
            .iter()
            .map(|(object, count)| {
                let header = FunctionHeader::new(symbol::INJECT, None, LongCoefficient::new(*count));
                TraverserFactory::Co.create(&header, (*object).into())
            })
            .collect()
    }

    fn summary(traversers: Result<Vec<Traverser<LongCoefficient>>>) -> Vec<(Value, u64)> {
        traversers
            .unwrap_or_default()
            .into_iter()
            .map(|t| (t.object().clone(), t.coefficient().count()))
            .collect()
    }

    #[test]
    fn test_dedup_resets_coefficients() {
        let emitted = DedupBarrier.emit(set(&[(3, 2), (1, 1), (3, 5)]));
        assert_eq!(summary(emitted), vec![(Value::Int(3), 1), (Value::Int(1), 1)]);
    }

    #[test]
    fn test_order_keeps_coefficients() {
        let ascending = OrderBarrier { descending: false }.emit(set(&[(3, 2), (1, 1), (2, 4)]));
        assert_eq!(
            summary(ascending),
            vec![(Value::Int(1), 1), (Value::Int(2), 4), (Value::Int(3), 2)]
        );

        let descending = OrderBarrier { descending: true }.emit(set(&[(3, 2), (1, 1), (2, 4)]));
        assert_eq!(
            summary(descending),
            vec![(Value::Int(3), 2), (Value::Int(2), 4), (Value::Int(1), 1)]
        );
    }
}
