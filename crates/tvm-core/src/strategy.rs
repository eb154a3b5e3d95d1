//! Bytecode rewrite passes.
//!
//! Strategies mutate a [`Program`] in place before it is compiled. Optimization
//! strategies are semantics-preserving simplifications; provider strategies bind
//! abstract placeholders to resources of the query's backing structure. Every
//! optimization runs before any provider, each strategy once per bytecode, in
//! registration order.

pub mod db;
pub mod identity;

use std::fmt::Debug;

use tracing::debug;

use crate::{
    Coefficient, Result, Shared,
    bytecode::{BytecodeId, Program},
};

pub use db::DbStrategy;
pub use identity::IdentityStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Optimization,
    Provider,
}

/// A rewrite pass. Applying a strategy to bytecode it already rewrote must be a no-op.
pub trait Strategy<C: Coefficient>: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> StrategyKind;

    /// Rewrites the bytecode `id` of `program`. The program's root sources are
    /// reachable through [`Program::root_of`].
    fn apply(&self, program: &mut Program<C>, id: BytecodeId<C>) -> Result<()>;
}

/// An ordered, name-deduplicated set of strategies.
#[derive(Debug, Clone)]
pub struct Strategies<C: Coefficient> {
    strategies: Vec<Shared<dyn Strategy<C>>>,
}

impl<C: Coefficient> Default for Strategies<C> {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }
}

impl<C: Coefficient> Strategies<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `strategy` unless one with the same name is already present.
    pub fn add(&mut self, strategy: Shared<dyn Strategy<C>>) {
        if !self.strategies.iter().any(|s| s.name() == strategy.name()) {
            self.strategies.push(strategy);
        }
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shared<dyn Strategy<C>>> {
        self.strategies.iter()
    }

    /// Applies every strategy to every bytecode of `program`.
    ///
    /// Optimization strategies are skipped when `optimize` is false; provider
    /// strategies always run.
    pub fn apply(&self, program: &mut Program<C>, optimize: bool) -> Result<()> {
        let kinds: &[StrategyKind] = if optimize {
            &[StrategyKind::Optimization, StrategyKind::Provider]
        } else {
            &[StrategyKind::Provider]
        };

        for kind in kinds {
            for strategy in self.strategies.iter().filter(|s| s.kind() == *kind) {
                for id in program.bytecode_ids() {
                    strategy.apply(program, id)?;
                }
                debug!(strategy = strategy.name(), kind = ?kind, "applied strategy");
            }
        }
        Ok(())
    }
}

impl<C: Coefficient> Extend<Shared<dyn Strategy<C>>> for Strategies<C> {
    fn extend<I: IntoIterator<Item = Shared<dyn Strategy<C>>>>(&mut self, iter: I) {
        iter.into_iter().for_each(|strategy| self.add(strategy));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LongCoefficient, bytecode::Instruction};
    use rstest::rstest;

    type L = LongCoefficient;

    /// Appends an instruction named after itself to the root bytecode.
    #[derive(Debug)]
    struct Marker {
        name: &'static str,
        kind: StrategyKind,
    }

    impl Strategy<L> for Marker {
        fn name(&self) -> &str {
            self.name
        }

        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn apply(&self, program: &mut Program<L>, id: BytecodeId<L>) -> Result<()> {
            if id == program.root() {
                program.add_instruction(id, Instruction::new(self.name, []));
            }
            Ok(())
        }
    }

    fn marker(name: &'static str, kind: StrategyKind) -> Shared<dyn Strategy<L>> {
        Shared::new(Marker { name, kind })
    }

    fn applied(strategies: &Strategies<L>, optimize: bool) -> Vec<String> {
        let mut program = Program::new();
        strategies.apply(&mut program, optimize).unwrap();
        let root = program.root();
        program
            .get(root)
            .instructions()
            .iter()
            .map(|instruction| instruction.op().to_string())
            .collect()
    }

    #[rstest]
    #[case::optimized(true, vec!["first_opt", "second_opt", "first_provider", "second_provider"])]
    #[case::unoptimized(false, vec!["first_provider", "second_provider"])]
    fn test_optimizations_run_before_providers(#[case] optimize: bool, #[case] expected: Vec<&str>) {
        let mut strategies = Strategies::new();
        strategies.extend([
            marker("first_provider", StrategyKind::Provider),
            marker("first_opt", StrategyKind::Optimization),
            marker("second_provider", StrategyKind::Provider),
            marker("second_opt", StrategyKind::Optimization),
        ]);

        assert_eq!(applied(&strategies, optimize), expected);
    }

    #[test]
    fn test_add_ignores_duplicate_names() {
        let mut strategies = Strategies::new();
        strategies.add(marker("db", StrategyKind::Provider));
        strategies.add(marker("db", StrategyKind::Optimization));
        strategies.add(marker("identity", StrategyKind::Optimization));

        assert_eq!(strategies.len(), 2);
        assert_eq!(
            strategies.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            vec![StrategyKind::Provider, StrategyKind::Optimization]
        );
        assert_eq!(applied(&strategies, true), vec!["identity", "db"]);
    }
}
