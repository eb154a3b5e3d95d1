use std::collections::VecDeque;

use tracing::trace;
use tvm_core::{Coefficient, Result, Shared, Traverser, TraverserSet, function::RepeatBranch};

use crate::step::{Produce, Pulled, Upstream};

/// Drives a repeat loop for one upstream traverser at a time.
///
/// Requeued traversers are bulked in a [`TraverserSet`] and the body runs once per
/// generation over the whole batch of traversers that continue looping.
pub(crate) struct RepeatStep<C: Coefficient> {
    function: Shared<RepeatBranch<C>>,
    input: TraverserSet<C>,
    output: VecDeque<Result<Traverser<C>>>,
}

impl<C: Coefficient> RepeatStep<C> {
    pub(crate) fn new(function: Shared<RepeatBranch<C>>) -> Self {
        Self {
            function,
            input: TraverserSet::new(),
            output: VecDeque::new(),
        }
    }

    /// Runs one generation: tests every queued traverser, then sends the survivors
    /// through the body together.
    fn generation(&mut self) -> Result<()> {
        let mut batch = Vec::with_capacity(self.input.len());
        for traverser in self.input.drain() {
            let route = self.function.before(traverser)?;
            self.output.extend(route.exit.map(Ok));
            batch.extend(route.again);
        }
        if batch.is_empty() {
            return Ok(());
        }

        trace!(repeat = ?self.function.id(), batch = batch.len(), "repeat generation");
        for traverser in self.function.body().iterate(batch)? {
            let route = self.function.after(traverser?)?;
            self.output.extend(route.exit.map(Ok));
            if let Some(again) = route.again {
                self.input.add(again);
            }
        }
        Ok(())
    }
}

impl<C: Coefficient> Produce<C> for RepeatStep<C> {
    fn produce(&mut self, upstream: &mut Upstream<'_, C>) -> Pulled<C> {
        loop {
            if let Some(next) = self.output.pop_front() {
                return Some(next);
            }
            if self.input.is_empty() {
                match upstream.next()? {
                    Ok(traverser) => self.input.add(traverser),
                    Err(e) => return Some(Err(e)),
                }
            }
            if let Err(e) = self.generation() {
                self.input.clear();
                return Some(Err(e));
            }
        }
    }

    fn clear(&mut self) {
        self.input.clear();
        self.output.clear();
    }
}
