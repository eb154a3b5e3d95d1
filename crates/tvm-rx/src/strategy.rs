use tracing::debug;
use tvm_core::{BytecodeId, Coefficient, Program, Result, Strategy, StrategyKind};
use uuid::Uuid;

/// Gives the root bytecode a query id when it has none, so the processor factory can
/// key worker pools by it.
#[derive(Debug, Default, Clone, Copy)]
pub struct RxStrategy;

impl<C: Coefficient> Strategy<C> for RxStrategy {
    fn name(&self) -> &str {
        "rx"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Provider
    }

    fn apply(&self, program: &mut Program<C>, id: BytecodeId<C>) -> Result<()> {
        if id != program.root() || program.sources().id.is_some() {
            return Ok(());
        }

        let query_id = Uuid::new_v4().to_string();
        debug!(id = %query_id, "assigned query id");
        program.sources_mut().id = Some(query_id.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvm_core::{LongCoefficient, Query};

    #[test]
    fn test_assigns_id_once() {
        let mut program = Query::<LongCoefficient>::new()
            .union([Query::new().incr()])
            .into_program();
        let ids: Vec<_> = program.bytecode_ids().collect();

        for id in &ids {
            RxStrategy.apply(&mut program, *id).unwrap();
        }
        let assigned = program.sources().id.clone();
        assert!(assigned.is_some());

        for id in &ids {
            RxStrategy.apply(&mut program, *id).unwrap();
        }
        assert_eq!(program.sources().id, assigned);
    }

    #[test]
    fn test_keeps_existing_id() {
        let mut program = Query::<LongCoefficient>::new().with_id("q").into_program();
        let root = program.root();
        RxStrategy.apply(&mut program, root).unwrap();
        assert_eq!(program.sources().id.as_deref(), Some("q"));
    }
}
