use crate::{
    Coefficient, Error, Result, Shared, Value, symbol,
    bytecode::Instruction,
    compiler::{Compilation, CompileContext},
    function::{FunctionKind, ReduceFunction},
    traverser::Traverser,
    value::Tuple,
};

fn count_of<C: Coefficient>(traverser: &Traverser<C>) -> i64 {
    i64::try_from(traverser.coefficient().count()).unwrap_or(i64::MAX)
}

fn expect_int(op: &str, value: &Value) -> Result<i64> {
    value.as_int().ok_or_else(|| Error::invalid_types(op, value))
}

#[derive(Debug)]
pub struct CountReduce;

impl CountReduce {
    pub(crate) fn compile<C: Coefficient>(
        _instruction: &Instruction<C>,
        _cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        Ok(FunctionKind::Reduce(Shared::new(Self)))
    }
}

impl<C: Coefficient> ReduceFunction<C> for CountReduce {
    fn initial_value(&self) -> Value {
        Value::Int(0)
    }

    fn apply(&self, traverser: &Traverser<C>, accumulator: Value) -> Result<Value> {
        let current = expect_int(symbol::COUNT, &accumulator)?;
        Ok(Value::Int(current.saturating_add(count_of(traverser))))
    }

    fn merge(&self, left: Value, right: Value) -> Result<Value> {
        Ok(Value::Int(
            expect_int(symbol::COUNT, &left)?.saturating_add(expect_int(symbol::COUNT, &right)?),
        ))
    }
}

#[derive(Debug)]
pub struct SumReduce;

impl SumReduce {
    pub(crate) fn compile<C: Coefficient>(
        _instruction: &Instruction<C>,
        _cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        Ok(FunctionKind::Reduce(Shared::new(Self)))
    }
}

impl<C: Coefficient> ReduceFunction<C> for SumReduce {
    fn initial_value(&self) -> Value {
        Value::Int(0)
    }

    fn apply(&self, traverser: &Traverser<C>, accumulator: Value) -> Result<Value> {
        let object = expect_int(symbol::SUM, traverser.object())?;
        let current = expect_int(symbol::SUM, &accumulator)?;
        Ok(Value::Int(
            current.saturating_add(object.saturating_mul(count_of(traverser))),
        ))
    }

    fn merge(&self, left: Value, right: Value) -> Result<Value> {
        Ok(Value::Int(
            expect_int(symbol::SUM, &left)?.saturating_add(expect_int(symbol::SUM, &right)?),
        ))
    }
}

/// Counts traversers per key, weighted by coefficient.
///
/// The key is the traverser's object, or the first result of the optional by-bytecode.
#[derive(Debug)]
pub struct GroupCountReduce<C: Coefficient> {
    by: Option<Shared<Compilation<C>>>,
}

impl<C: Coefficient> GroupCountReduce<C> {
    pub fn new(by: Option<Shared<Compilation<C>>>) -> Self {
        Self { by }
    }

    pub(crate) fn compile(
        instruction: &Instruction<C>,
        cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        let by = match instruction.args() {
            [] => None,
            [arg] => Some(cx.nested(instruction.op(), arg)?),
            _ => {
                return Err(Error::invalid_arguments(
                    instruction.op(),
                    "expected at most one by-bytecode",
                ));
            }
        };
        Ok(FunctionKind::Reduce(Shared::new(Self::new(by))))
    }

    fn add(tuple: &mut Tuple, key: Value, count: i64) -> Result<()> {
        let current = match tuple.get(&key) {
            Some(value) => expect_int(symbol::GROUP_COUNT, value)?,
            None => 0,
        };
        tuple.set(key, Value::Int(current.saturating_add(count)));
        Ok(())
    }

    fn into_tuple(value: Value) -> Result<Tuple> {
        match value {
            Value::Map(tuple) => Ok(tuple),
            other => Err(Error::invalid_types(symbol::GROUP_COUNT, &other)),
        }
    }
}

impl<C: Coefficient> ReduceFunction<C> for GroupCountReduce<C> {
    fn initial_value(&self) -> Value {
        Value::Map(Tuple::new())
    }

    fn apply(&self, traverser: &Traverser<C>, accumulator: Value) -> Result<Value> {
        let key = match &self.by {
            Some(by) => by.map_traverser(traverser)?.object().clone(),
            None => traverser.object().clone(),
        };
        let mut tuple = Self::into_tuple(accumulator)?;
        Self::add(&mut tuple, key, count_of(traverser))?;
        Ok(Value::Map(tuple))
    }

    fn merge(&self, left: Value, right: Value) -> Result<Value> {
        let mut merged = Self::into_tuple(left)?;
        for (key, count) in Self::into_tuple(right)? {
            Self::add(&mut merged, key, expect_int(symbol::GROUP_COUNT, &count)?)?;
        }
        Ok(Value::Map(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LongCoefficient, function::FunctionHeader, traverser::TraverserFactory};
    use rstest::rstest;

    fn tuple(entries: &[(&str, i64)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (Value::from(*k), Value::Int(*v)))
                .collect(),
        )
    }

    fn traverser(object: Value, count: u64) -> Traverser<LongCoefficient> {
        let header = FunctionHeader::new(symbol::INJECT, None, LongCoefficient::new(count));
        TraverserFactory::Co.create(&header, object)
    }

    // A naive merge that re-seeds an empty accumulator drops both sides; entries from
    // each partial accumulator must survive and counts must add up per key.
    #[test]
    fn test_group_count_merge_sums_per_key() {
        let reduce = GroupCountReduce::<LongCoefficient>::new(None);
        let merged = reduce.merge(tuple(&[("a", 2), ("b", 1)]), tuple(&[("a", 1), ("c", 3)]));
        assert_eq!(merged, Ok(tuple(&[("a", 3), ("b", 1), ("c", 3)])));
    }

    #[test]
    fn test_group_count_merge_is_associative() {
        let reduce = GroupCountReduce::<LongCoefficient>::new(None);
        let (x, y, z) = (tuple(&[("a", 1)]), tuple(&[("b", 2)]), tuple(&[("a", 4), ("c", 1)]));

        let left = reduce
            .merge(x.clone(), y.clone())
            .and_then(|xy| reduce.merge(xy, z.clone()));
        let right = reduce.merge(y, z).and_then(|yz| reduce.merge(x, yz));

        let sorted = |value: Result<Value>| {
            value.map(|v| {
                let mut entries: Vec<(Value, Value)> = v.as_map().cloned().unwrap_or_default().into_iter().collect();
                entries.sort();
                entries
            })
        };
        assert_eq!(sorted(left), sorted(right));
    }

    #[test]
    fn test_group_count_weights_by_coefficient() {
        let reduce = GroupCountReduce::<LongCoefficient>::new(None);
        let accumulator = [traverser("a".into(), 2), traverser("b".into(), 1), traverser("a".into(), 3)]
            .iter()
            .try_fold(ReduceFunction::<LongCoefficient>::initial_value(&reduce), |acc, t| reduce.apply(t, acc));
        assert_eq!(accumulator, Ok(tuple(&[("a", 5), ("b", 1)])));
    }

    #[rstest]
    #[case(vec![(1, 1), (2, 3), (5, 2)], 17)]
    #[case(vec![], 0)]
    fn test_sum(#[case] input: Vec<(i64, u64)>, #[case] expected: i64) {
        let total = input
            .into_iter()
            .map(|(object, count)| traverser(object.into(), count))
            .try_fold(Value::Int(0), |acc, t| SumReduce.apply(&t, acc));
        assert_eq!(total, Ok(Value::Int(expected)));
    }

    #[test]
    fn test_count_merge() {
        let left = CountReduce.apply(&traverser(1.into(), 4), Value::Int(0));
        let merged = left.and_then(|l| ReduceFunction::<LongCoefficient>::merge(&CountReduce, l, Value::Int(3)));
        assert_eq!(merged, Ok(Value::Int(7)));
    }
}
