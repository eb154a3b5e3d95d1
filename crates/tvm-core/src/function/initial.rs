use crate::{
    Coefficient, Error, Result, Shared, Value,
    bytecode::{Arg, Instruction},
    compiler::CompileContext,
    function::{FunctionKind, InitialFunction},
    structure::StructureHandle,
};

/// Seeds the pipeline with literal values.
#[derive(Debug)]
pub struct InjectInitial {
    objects: Vec<Value>,
}

impl InjectInitial {
    pub fn new(objects: Vec<Value>) -> Self {
        Self { objects }
    }

    pub(crate) fn compile<C: Coefficient>(
        instruction: &Instruction<C>,
        _cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        let objects = instruction
            .args()
            .iter()
            .map(|arg| {
                arg.as_value()
                    .cloned()
                    .ok_or_else(|| Error::invalid_arguments(instruction.op(), "inject takes literal values"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(FunctionKind::Initial(Shared::new(Self::new(objects))))
    }
}

impl InitialFunction for InjectInitial {
    fn get(&self) -> Box<dyn Iterator<Item = Value> + Send> {
        Box::new(self.objects.clone().into_iter())
    }
}

/// Seeds the pipeline with the structure minted for this execution.
#[derive(Debug)]
pub struct DbInitial {
    structure: StructureHandle,
}

impl DbInitial {
    pub(crate) fn compile<C: Coefficient>(
        instruction: &Instruction<C>,
        _cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        match instruction.arg(0).and_then(Arg::as_value) {
            Some(Value::Structure(structure)) => Ok(FunctionKind::Initial(Shared::new(Self {
                structure: structure.clone(),
            }))),
            // still deferred: no provider strategy bound a structure
            None => Err(Error::NoStructureFactory),
            Some(other) => Err(Error::invalid_types(instruction.op(), other)),
        }
    }
}

impl InitialFunction for DbInitial {
    fn get(&self) -> Box<dyn Iterator<Item = Value> + Send> {
        Box::new(std::iter::once(Value::Structure(self.structure.clone())))
    }
}
