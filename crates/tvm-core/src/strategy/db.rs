use tracing::debug;

use crate::{
    Coefficient, Error, Result, Shared, Value, symbol,
    bytecode::{Arg, BytecodeId, Instruction, Program},
    strategy::{Strategy, StrategyKind},
};

/// Binds deferred `db` instructions to a structure minted from the root's structure factory.
#[derive(Debug, Default, Clone, Copy)]
pub struct DbStrategy;

impl DbStrategy {
    fn is_deferred<C: Coefficient>(instruction: &Instruction<C>) -> bool {
        instruction.op() == symbol::DB && instruction.args().is_empty()
    }
}

impl<C: Coefficient> Strategy<C> for DbStrategy {
    fn name(&self) -> &str {
        "db"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Provider
    }

    fn apply(&self, program: &mut Program<C>, id: BytecodeId<C>) -> Result<()> {
        if !program.get(id).instructions().iter().any(Self::is_deferred) {
            return Ok(());
        }

        let root = program.root_of(id);
        let factory = program
            .get(root)
            .sources()
            .structure
            .as_ref()
            .map(Shared::clone)
            .ok_or(Error::NoStructureFactory)?;

        for instruction in program.get_mut(id).instructions_mut().iter_mut() {
            if Self::is_deferred(instruction) {
                let structure = factory.mint()?;
                debug!(structure = %structure, "bound db instruction");
                *instruction = instruction
                    .clone()
                    .with_args([Arg::Value(Value::Structure(structure))]);
            }
        }
        Ok(())
    }
}
