//! Traversers: the unit of data flowing through a compiled pipeline.

use std::{
    collections::VecDeque,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{Coefficient, Path, Shared, Value, function::FunctionHeader};

/// Compile-unique identifier of a repeat branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepeatId(pub u32);

/// Loop state of one enclosing repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopFrame {
    pub id: RepeatId,
    pub count: u64,
}

/// An object with its multiplicity, optional path and loop bookkeeping.
///
/// The object is shared by reference between clones and must never be mutated once
/// attached. Equality and hashing ignore the coefficient so equal traversers can be
/// bulked by summing it.
#[derive(Debug, Clone)]
pub struct Traverser<C: Coefficient> {
    object: Shared<Value>,
    coefficient: C,
    path: Option<Path>,
    loops: SmallVec<[LoopFrame; 2]>,
}

impl<C: Coefficient> Traverser<C> {
    pub fn object(&self) -> &Value {
        &self.object
    }

    pub fn shared_object(&self) -> &Shared<Value> {
        &self.object
    }

    pub fn coefficient(&self) -> &C {
        &self.coefficient
    }

    pub fn coefficient_mut(&mut self) -> &mut C {
        &mut self.coefficient
    }

    pub fn with_coefficient(mut self, coefficient: C) -> Self {
        self.coefficient = coefficient;
        self
    }

    /// The visited path. `None` when the traverser was created by a [`TraverserFactory::Co`].
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    /// Loop count of the innermost enclosing repeat, `0` outside of any repeat.
    pub fn loops(&self) -> u64 {
        self.loops.last().map_or(0, |frame| frame.count)
    }

    /// Derives the traverser produced when `function` maps this one to `object`.
    pub fn split(&self, function: &FunctionHeader<C>, object: Value) -> Self {
        let mut coefficient = self.coefficient.clone();
        coefficient.multiply(function.coefficient());

        let path = self.path.as_ref().map(|path| {
            let mut path = path.clone();
            path.add(function.label().cloned(), object.clone());
            path
        });

        Self {
            object: Shared::new(object),
            coefficient,
            path,
            loops: self.loops.clone(),
        }
    }

    /// Enters repeat `id` with a zero count unless it is already the innermost loop.
    pub fn repeat_enter(self, id: RepeatId) -> Self {
        if self.loops.last().is_some_and(|frame| frame.id == id) {
            return self;
        }
        let mut entered = self;
        entered.loops.push(LoopFrame { id, count: 0 });
        entered
    }

    /// Increments the loop counter of repeat `id`, entering it on first use.
    pub fn repeat_loop(&self, id: RepeatId) -> Self {
        let mut clone = self.clone();
        match clone.loops.last_mut() {
            Some(frame) if frame.id == id => frame.count += 1,
            _ => clone.loops.push(LoopFrame { id, count: 1 }),
        }
        clone
    }

    /// Marks the traverser as having exited repeat `id`.
    pub fn repeat_done(&self, id: RepeatId) -> Self {
        let mut clone = self.clone();
        if clone.loops.last().is_some_and(|frame| frame.id == id) {
            clone.loops.pop();
        }
        clone
    }

    /// Yields this traverser's object once per unit of its coefficient.
    pub fn expand(&self) -> impl Iterator<Item = Shared<Value>> + use<C> {
        std::iter::repeat_n(Shared::clone(&self.object), self.coefficient.count() as usize)
    }
}

impl<C: Coefficient> PartialEq for Traverser<C> {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object && self.path == other.path && self.loops == other.loops
    }
}

impl<C: Coefficient> Eq for Traverser<C> {}

impl<C: Coefficient> Hash for Traverser<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object.hash(state);
        self.path.hash(state);
        self.loops.hash(state);
    }
}

impl<C: Coefficient> Display for Traverser<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{}", self.coefficient, self.object)?;
        if let Some(path) = &self.path {
            write!(f, "{}", path)?;
        }
        Ok(())
    }
}

/// Creates root traversers for a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraverserFactory {
    /// Coefficient and object only.
    #[default]
    Co,
    /// Coefficient, object and path.
    Cop,
}

impl TraverserFactory {
    pub fn create<C: Coefficient>(&self, function: &FunctionHeader<C>, object: Value) -> Traverser<C> {
        let path = match self {
            TraverserFactory::Co => None,
            TraverserFactory::Cop => {
                let mut path = Path::new();
                path.add(function.label().cloned(), object.clone());
                Some(path)
            }
        };

        Traverser {
            object: Shared::new(object),
            coefficient: function.coefficient().clone(),
            path,
            loops: SmallVec::new(),
        }
    }
}

/// Insertion-ordered queue that bulks equal traversers by summing their coefficients.
#[derive(Debug, Clone)]
pub struct TraverserSet<C: Coefficient> {
    items: VecDeque<Traverser<C>>,
    positions: FxHashMap<Traverser<C>, u64>,
    popped: u64,
}

impl<C: Coefficient> Default for TraverserSet<C> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            positions: FxHashMap::default(),
            popped: 0,
        }
    }
}

impl<C: Coefficient> TraverserSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, traverser: Traverser<C>) {
        match self.positions.get(&traverser) {
            Some(&position) => {
                let slot = (position - self.popped) as usize;
                self.items[slot].coefficient.sum(&traverser.coefficient);
            }
            None => {
                self.positions
                    .insert(traverser.clone(), self.popped + self.items.len() as u64);
                self.items.push_back(traverser);
            }
        }
    }

    pub fn pop(&mut self) -> Option<Traverser<C>> {
        let traverser = self.items.pop_front()?;
        self.positions.remove(&traverser);
        self.popped += 1;
        Some(traverser)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.positions.clear();
        self.popped = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Traverser<C>> {
        self.items.iter()
    }

    /// Removes every queued traverser in insertion order.
    pub fn drain(&mut self) -> Vec<Traverser<C>> {
        self.positions.clear();
        self.popped = 0;
        self.items.drain(..).collect()
    }
}

impl<C: Coefficient> Extend<Traverser<C>> for TraverserSet<C> {
    fn extend<I: IntoIterator<Item = Traverser<C>>>(&mut self, iter: I) {
        iter.into_iter().for_each(|traverser| self.add(traverser));
    }
}

impl<C: Coefficient> FromIterator<Traverser<C>> for TraverserSet<C> {
    fn from_iter<I: IntoIterator<Item = Traverser<C>>>(iter: I) -> Self {
        let mut set = TraverserSet::new();
        set.extend(iter);
        set
    }
}

impl<C: Coefficient> IntoIterator for TraverserSet<C> {
    type Item = Traverser<C>;
    type IntoIter = std::collections::vec_deque::IntoIter<Traverser<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
