use crate::{
    Coefficient, Error, Result, Shared, Value, symbol,
    bytecode::{Arg, Instruction},
    compiler::{Compilation, CompilationCircle, CompileContext},
    function::{FunctionKind, MapFunction},
    path::{Path, Pop},
    traverser::Traverser,
};

/// `map("traverser::object")`: projects the traverser's own object.
#[derive(Debug)]
pub struct IdentityMap;

impl<C: Coefficient> MapFunction<C> for IdentityMap {
    fn apply(&self, traverser: &Traverser<C>) -> Result<Value> {
        Ok(traverser.object().clone())
    }
}

/// Maps a traverser to the first object its nested bytecode yields.
#[derive(Debug)]
pub struct BytecodeMap<C: Coefficient> {
    compilation: Shared<Compilation<C>>,
}

impl<C: Coefficient> MapFunction<C> for BytecodeMap<C> {
    fn apply(&self, traverser: &Traverser<C>) -> Result<Value> {
        self.compilation
            .map_traverser(traverser)
            .map(|traverser| traverser.object().clone())
    }
}

pub(crate) fn compile_map<C: Coefficient>(
    instruction: &Instruction<C>,
    cx: &CompileContext<'_, C>,
) -> Result<FunctionKind<C>> {
    match instruction.args() {
        [arg] if arg.as_str() == Some(symbol::TRAVERSER_OBJECT) => {
            Ok(FunctionKind::Map(Shared::new(IdentityMap)))
        }
        [arg @ Arg::Bytecode(_)] => Ok(FunctionKind::Map(Shared::new(BytecodeMap {
            compilation: cx.nested(instruction.op(), arg)?,
        }))),
        _ => Err(Error::invalid_arguments(
            instruction.op(),
            "expected \"traverser::object\" or a single bytecode",
        )),
    }
}

#[derive(Debug)]
pub struct IncrMap;

impl<C: Coefficient> MapFunction<C> for IncrMap {
    fn apply(&self, traverser: &Traverser<C>) -> Result<Value> {
        match traverser.object() {
            Value::Int(i) => i
                .checked_add(1)
                .map(Value::Int)
                .ok_or_else(|| Error::Overflow(symbol::INCR.into())),
            other => Err(Error::invalid_types(symbol::INCR, other)),
        }
    }
}

pub(crate) fn compile_incr<C: Coefficient>(
    _instruction: &Instruction<C>,
    _cx: &CompileContext<'_, C>,
) -> Result<FunctionKind<C>> {
    Ok(FunctionKind::Map(Shared::new(IncrMap)))
}

#[derive(Debug)]
pub struct ConstantMap {
    constant: Value,
}

impl<C: Coefficient> MapFunction<C> for ConstantMap {
    fn apply(&self, _traverser: &Traverser<C>) -> Result<Value> {
        Ok(self.constant.clone())
    }
}

pub(crate) fn compile_constant<C: Coefficient>(
    instruction: &Instruction<C>,
    _cx: &CompileContext<'_, C>,
) -> Result<FunctionKind<C>> {
    match instruction.args() {
        [Arg::Value(constant)] => Ok(FunctionKind::Map(Shared::new(ConstantMap {
            constant: constant.clone(),
        }))),
        _ => Err(Error::invalid_arguments(instruction.op(), "expected a single value")),
    }
}

/// Emits the loop count of the innermost enclosing repeat.
#[derive(Debug)]
pub struct LoopsMap;

impl<C: Coefficient> MapFunction<C> for LoopsMap {
    fn apply(&self, traverser: &Traverser<C>) -> Result<Value> {
        Ok(Value::Int(traverser.loops() as i64))
    }
}

pub(crate) fn compile_loops<C: Coefficient>(
    _instruction: &Instruction<C>,
    _cx: &CompileContext<'_, C>,
) -> Result<FunctionKind<C>> {
    Ok(FunctionKind::Map(Shared::new(LoopsMap)))
}

/// Emits the traverser's path, optionally narrowed to labels and rewritten by modulators.
///
/// Args are `label* ["|" bytecode*]`. With labels, the result holds the last object
/// stored under each label; otherwise every entry of the path is kept.
#[derive(Debug)]
pub struct PathMap<C: Coefficient> {
    labels: Vec<smol_str::SmolStr>,
    by: CompilationCircle<C>,
}

impl<C: Coefficient> MapFunction<C> for PathMap<C> {
    fn apply(&self, traverser: &Traverser<C>) -> Result<Value> {
        let path = traverser.path().cloned().unwrap_or_default();
        if self.labels.is_empty() && self.by.is_empty() {
            return Ok(Value::Path(path));
        }

        let mut projected = Path::new();
        if self.labels.is_empty() {
            for (position, (label, object)) in path.iter().enumerate() {
                projected.add(
                    label.map(Into::into),
                    self.by.process_at(position, object.clone())?,
                );
            }
        } else {
            for (position, label) in self.labels.iter().enumerate() {
                let object = path.get(Pop::Last, label)?;
                projected.add(Some(label.clone()), self.by.process_at(position, object)?);
            }
        }
        Ok(Value::Path(projected))
    }
}

pub(crate) fn compile_path<C: Coefficient>(
    instruction: &Instruction<C>,
    cx: &CompileContext<'_, C>,
) -> Result<FunctionKind<C>> {
    let mut labels = Vec::new();
    let mut by = Vec::new();
    let mut in_labels = true;

    for arg in instruction.args() {
        match arg {
            Arg::Value(Value::Str(s)) if s == symbol::BY_SEPARATOR => in_labels = false,
            Arg::Value(Value::Str(label)) if in_labels => labels.push(label.clone()),
            Arg::Bytecode(_) if !in_labels => by.push(cx.nested(instruction.op(), arg)?),
            other => {
                return Err(Error::invalid_arguments(
                    instruction.op(),
                    format!("unexpected argument {:?}", other),
                ));
            }
        }
    }

    Ok(FunctionKind::Map(Shared::new(PathMap {
        labels,
        by: CompilationCircle::new(by),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LongCoefficient, function::FunctionHeader, traverser::TraverserFactory};
    use rstest::rstest;

    fn traverser(object: Value) -> Traverser<LongCoefficient> {
        let header = FunctionHeader::new(symbol::INJECT, Some("a".into()), LongCoefficient::new(1));
        TraverserFactory::Cop.create(&header, object)
    }

    #[rstest]
    #[case(Value::Int(1), Ok(Value::Int(2)))]
    #[case(Value::Int(-1), Ok(Value::Int(0)))]
    #[case(Value::Int(i64::MAX), Err(Error::Overflow(symbol::INCR.into())))]
    #[case(Value::from("x"), Err(Error::invalid_types(symbol::INCR, &Value::from("x"))))]
    fn test_incr(#[case] object: Value, #[case] expected: Result<Value>) {
        assert_eq!(IncrMap.apply(&traverser(object)), expected);
    }

    #[test]
    fn test_path_with_labels_projects_last_objects() {
        let start = traverser(1.into());
        let header = FunctionHeader::new(symbol::INCR, Some("a".into()), LongCoefficient::new(1));
        let next = start.split(&header, 2.into());

        let path_map = PathMap::<LongCoefficient> {
            labels: vec!["a".into()],
            by: CompilationCircle::new(Vec::new()),
        };
        assert_eq!(
            path_map.apply(&next).map(|v| v.to_string()),
            Ok("[a:2]".to_string())
        );

        let missing = PathMap::<LongCoefficient> {
            labels: vec!["b".into()],
            by: CompilationCircle::new(Vec::new()),
        };
        assert_eq!(missing.apply(&next), Err(Error::PathLabelNotFound("b".into())));
    }

    #[test]
    fn test_path_without_args_is_full_path() {
        let path_map = PathMap::<LongCoefficient> {
            labels: Vec::new(),
            by: CompilationCircle::new(Vec::new()),
        };
        assert_eq!(
            path_map.apply(&traverser(7.into())).map(|v| v.to_string()),
            Ok("[a:7]".to_string())
        );
    }
}
