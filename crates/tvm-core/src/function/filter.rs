use std::{cmp::Ordering, str::FromStr};

use crate::{
    Coefficient, Error, Result, Shared, Value,
    bytecode::{Arg, Instruction},
    compiler::{Compilation, CompileContext},
    function::{FilterFunction, FunctionKind},
    traverser::Traverser,
};

/// Comparison operators accepted by `is`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Compare {
    pub fn test(&self, left: &Value, right: &Value) -> bool {
        let ordering = left.cmp(right);
        match self {
            Compare::Eq => ordering == Ordering::Equal,
            Compare::Neq => ordering != Ordering::Equal,
            Compare::Lt => ordering == Ordering::Less,
            Compare::Lte => ordering != Ordering::Greater,
            Compare::Gt => ordering == Ordering::Greater,
            Compare::Gte => ordering != Ordering::Less,
        }
    }
}

impl FromStr for Compare {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "eq" => Ok(Compare::Eq),
            "neq" => Ok(Compare::Neq),
            "lt" => Ok(Compare::Lt),
            "lte" => Ok(Compare::Lte),
            "gt" => Ok(Compare::Gt),
            "gte" => Ok(Compare::Gte),
            _ => Err(Error::invalid_arguments("is", format!("unknown comparison \"{}\"", s))),
        }
    }
}

/// `is(value)` or `is(compare, value)`.
#[derive(Debug)]
pub struct IsFilter {
    compare: Compare,
    operand: Value,
}

impl IsFilter {
    pub fn new(compare: Compare, operand: Value) -> Self {
        Self { compare, operand }
    }

    pub(crate) fn compile<C: Coefficient>(
        instruction: &Instruction<C>,
        _cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        let filter = match instruction.args() {
            [Arg::Value(operand)] => Self::new(Compare::Eq, operand.clone()),
            [Arg::Value(Value::Str(compare)), Arg::Value(operand)] => {
                Self::new(compare.parse()?, operand.clone())
            }
            _ => {
                return Err(Error::invalid_arguments(
                    instruction.op(),
                    "expected a value or a comparison and a value",
                ));
            }
        };
        Ok(FunctionKind::Filter(Shared::new(filter)))
    }
}

impl<C: Coefficient> FilterFunction<C> for IsFilter {
    fn test(&self, traverser: &Traverser<C>) -> Result<bool> {
        Ok(self.compare.test(traverser.object(), &self.operand))
    }
}

/// Passes a traverser when its nested bytecode yields at least one result.
#[derive(Debug)]
pub struct BytecodeFilter<C: Coefficient> {
    compilation: Shared<Compilation<C>>,
}

impl<C: Coefficient> BytecodeFilter<C> {
    pub(crate) fn compile(
        instruction: &Instruction<C>,
        cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        match instruction.args() {
            [arg] => Ok(FunctionKind::Filter(Shared::new(Self {
                compilation: cx.nested(instruction.op(), arg)?,
            }))),
            _ => Err(Error::invalid_arguments(instruction.op(), "expected a single bytecode")),
        }
    }
}

impl<C: Coefficient> FilterFunction<C> for BytecodeFilter<C> {
    fn test(&self, traverser: &Traverser<C>) -> Result<bool> {
        self.compilation.filter_traverser(traverser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Compare::Eq, 2, 2, true)]
    #[case(Compare::Neq, 2, 2, false)]
    #[case(Compare::Lt, 1, 2, true)]
    #[case(Compare::Lte, 2, 2, true)]
    #[case(Compare::Gt, 1, 2, false)]
    #[case(Compare::Gte, 3, 2, true)]
    fn test_compare(#[case] compare: Compare, #[case] left: i64, #[case] right: i64, #[case] expected: bool) {
        assert_eq!(compare.test(&left.into(), &right.into()), expected);
    }

    #[test]
    fn test_unknown_comparison() {
        assert!(matches!(
            "between".parse::<Compare>(),
            Err(Error::InvalidArguments { .. })
        ));
    }
}
