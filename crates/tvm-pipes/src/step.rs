//! The pull protocol shared by every step of a pipeline.
//!
//! Steps do not point at their predecessor. A pipeline owns its steps in order and
//! hands each one an [`Upstream`] view over the steps before it.

use tvm_core::{Coefficient, Result, Traverser};

pub type Pulled<C> = Option<Result<Traverser<C>>>;

pub trait Step<C: Coefficient>: Send {
    /// Returns `true` if [`Step::next`] will yield. Stages at most one result, so
    /// repeated calls never pull upstream twice.
    fn has_next(&mut self, upstream: &mut Upstream<'_, C>) -> bool;

    fn next(&mut self, upstream: &mut Upstream<'_, C>) -> Pulled<C>;

    /// Drops staged and buffered state. Upstream steps are left untouched.
    fn reset(&mut self);
}

/// The steps preceding the one currently pulling.
pub struct Upstream<'a, C: Coefficient> {
    steps: &'a mut [Box<dyn Step<C>>],
}

impl<'a, C: Coefficient> Upstream<'a, C> {
    pub fn new(steps: &'a mut [Box<dyn Step<C>>]) -> Self {
        Self { steps }
    }

    pub fn has_next(&mut self) -> bool {
        match self.steps.split_last_mut() {
            Some((last, rest)) => last.has_next(&mut Upstream::new(rest)),
            None => false,
        }
    }

    pub fn next(&mut self) -> Pulled<C> {
        match self.steps.split_last_mut() {
            Some((last, rest)) => last.next(&mut Upstream::new(rest)),
            None => None,
        }
    }
}

/// Produces a step's outputs one at a time; `None` means exhausted for now.
pub(crate) trait Produce<C: Coefficient>: Send {
    fn produce(&mut self, upstream: &mut Upstream<'_, C>) -> Pulled<C>;

    fn clear(&mut self) {}
}

/// Adapts a [`Produce`] into a [`Step`] with a one-slot stage.
pub(crate) struct Staged<C: Coefficient, P> {
    producer: P,
    staged: Pulled<C>,
}

impl<C: Coefficient, P: Produce<C>> Staged<C, P> {
    pub(crate) fn new(producer: P) -> Self {
        Self {
            producer,
            staged: None,
        }
    }

    pub(crate) fn boxed(producer: P) -> Box<dyn Step<C>>
    where
        P: 'static,
    {
        Box::new(Self::new(producer))
    }
}

impl<C: Coefficient, P: Produce<C>> Step<C> for Staged<C, P> {
    fn has_next(&mut self, upstream: &mut Upstream<'_, C>) -> bool {
        if self.staged.is_none() {
            self.staged = self.producer.produce(upstream);
        }
        self.staged.is_some()
    }

    fn next(&mut self, upstream: &mut Upstream<'_, C>) -> Pulled<C> {
        match self.staged.take() {
            Some(staged) => Some(staged),
            None => self.producer.produce(upstream),
        }
    }

    fn reset(&mut self) {
        self.staged = None;
        self.producer.clear();
    }
}
