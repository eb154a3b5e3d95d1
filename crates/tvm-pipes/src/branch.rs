use std::collections::VecDeque;

use tracing::trace;
use tvm_core::{Coefficient, Result, Shared, Traverser, function::BranchFunction};

use crate::step::{Produce, Pulled, Upstream};

/// Routes each upstream traverser through the sub-compilations of its matching branches.
///
/// A whole generation is staged per upstream pull, so only one nested pipeline is
/// open at a time.
pub(crate) struct BranchStep<C: Coefficient> {
    function: Shared<BranchFunction<C>>,
    staged: VecDeque<Result<Traverser<C>>>,
}

impl<C: Coefficient> BranchStep<C> {
    pub(crate) fn new(function: Shared<BranchFunction<C>>) -> Self {
        Self {
            function,
            staged: VecDeque::new(),
        }
    }

    fn stage(&mut self, traverser: Traverser<C>) -> Result<()> {
        for compilation in self.function.route(&traverser)? {
            let outputs = compilation.iterate(vec![traverser.clone()])?;
            self.staged.extend(outputs);
        }
        trace!(staged = self.staged.len(), "branch generation staged");
        Ok(())
    }
}

impl<C: Coefficient> Produce<C> for BranchStep<C> {
    fn produce(&mut self, upstream: &mut Upstream<'_, C>) -> Pulled<C> {
        loop {
            if let Some(next) = self.staged.pop_front() {
                return Some(next);
            }
            let traverser = match upstream.next()? {
                Ok(traverser) => traverser,
                Err(e) => return Some(Err(e)),
            };
            if let Err(e) = self.stage(traverser) {
                return Some(Err(e));
            }
        }
    }

    fn clear(&mut self) {
        self.staged.clear();
    }
}
