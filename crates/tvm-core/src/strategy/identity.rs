use crate::{
    Coefficient, Result, symbol,
    bytecode::{BytecodeId, Instruction, Program},
    strategy::{Strategy, StrategyKind},
};

/// Removes labeled `map("traverser::object")` instructions with a unity coefficient.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityStrategy;

impl IdentityStrategy {
    fn is_identity<C: Coefficient>(instruction: &Instruction<C>) -> bool {
        instruction.op() == symbol::MAP
            && matches!(instruction.args(), [arg] if arg.as_str() == Some(symbol::TRAVERSER_OBJECT))
            && instruction.label().is_some()
            && instruction.coefficient().is_unity()
    }
}

impl<C: Coefficient> Strategy<C> for IdentityStrategy {
    fn name(&self) -> &str {
        "identity"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Optimization
    }

    fn apply(&self, program: &mut Program<C>, id: BytecodeId<C>) -> Result<()> {
        program
            .get_mut(id)
            .instructions_mut()
            .retain(|instruction| !Self::is_identity(instruction));
        Ok(())
    }
}
