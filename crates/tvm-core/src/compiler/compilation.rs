use std::{
    fmt::{self, Debug, Formatter},
    sync::OnceLock,
};

use itertools::Itertools;
use smol_str::SmolStr;

use crate::{
    Coefficient, Error, Result, Shared, Value,
    function::{CFunction, FunctionHeader},
    processor::{Processor, ProcessorFactory, TraverserIter},
    traverser::{Traverser, TraverserFactory},
};

/// An ordered chain of compiled functions, ready to be minted into a processor.
///
/// Nested compilations mint their processor once, on first use, and reuse it for
/// every traverser they are applied to.
pub struct Compilation<C: Coefficient> {
    functions: Vec<CFunction<C>>,
    traverser_factory: TraverserFactory,
    processor_factory: Shared<dyn ProcessorFactory<C>>,
    processor: OnceLock<Box<dyn Processor<C>>>,
    nested: bool,
    id: Option<SmolStr>,
}

impl<C: Coefficient> Compilation<C> {
    pub fn new(
        functions: Vec<CFunction<C>>,
        traverser_factory: TraverserFactory,
        processor_factory: Shared<dyn ProcessorFactory<C>>,
        nested: bool,
    ) -> Self {
        Self {
            functions,
            traverser_factory,
            processor_factory,
            processor: OnceLock::new(),
            nested,
            id: None,
        }
    }

    pub fn with_id(mut self, id: Option<SmolStr>) -> Self {
        self.id = id;
        self
    }

    /// Id of the query this compilation belongs to, taken from the root sources.
    pub fn id(&self) -> Option<&SmolStr> {
        self.id.as_ref()
    }

    pub fn functions(&self) -> &[CFunction<C>] {
        &self.functions
    }

    pub fn traverser_factory(&self) -> TraverserFactory {
        self.traverser_factory
    }

    pub fn processor_factory(&self) -> &Shared<dyn ProcessorFactory<C>> {
        &self.processor_factory
    }

    /// Whether this compilation was compiled from a bytecode argument rather than a root.
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// An empty compilation behaves as the identity.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn processor(&self) -> Result<&dyn Processor<C>> {
        if self.processor.get().is_none() {
            let minted = self.processor_factory.mint(self)?;
            // A concurrent caller may have won the race; either processor is equivalent.
            let _ = self.processor.set(minted);
        }
        self.processor
            .get()
            .map(|processor| processor.as_ref())
            .ok_or(Error::NoProcessorFactory)
    }

    pub fn iterate(&self, starts: Vec<Traverser<C>>) -> Result<TraverserIter<C>> {
        Ok(self.processor()?.iterator(starts))
    }

    /// Returns `true` when running `traverser` through this compilation yields anything.
    pub fn filter_traverser(&self, traverser: &Traverser<C>) -> Result<bool> {
        if self.is_empty() {
            return Ok(true);
        }
        match self.iterate(vec![traverser.clone()])?.next() {
            Some(result) => result.map(|_| true),
            None => Ok(false),
        }
    }

    /// Returns the first traverser produced for `traverser`.
    pub fn map_traverser(&self, traverser: &Traverser<C>) -> Result<Traverser<C>> {
        if self.is_empty() {
            return Ok(traverser.clone());
        }
        match self.iterate(vec![traverser.clone()])?.next() {
            Some(result) => result,
            None => Err(Error::Processor(format!(
                "{:?} produced no result for {}",
                self, traverser
            ))),
        }
    }

    /// Applies this compilation to a bare object.
    pub fn map_object(&self, object: Value) -> Result<Value> {
        if self.is_empty() {
            return Ok(object);
        }
        let header = FunctionHeader::new("by", None, C::one());
        let traverser = self.traverser_factory.create(&header, object);
        self.map_traverser(&traverser)
            .map(|traverser| traverser.object().clone())
    }
}

impl<C: Coefficient> Debug for Compilation<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Compilation[{}]", self.functions.iter().join(", "))
    }
}

/// By-modulators applied round-robin over the positions of a processed sequence.
#[derive(Debug)]
pub struct CompilationCircle<C: Coefficient> {
    compilations: Vec<Shared<Compilation<C>>>,
}

impl<C: Coefficient> CompilationCircle<C> {
    pub fn new(compilations: Vec<Shared<Compilation<C>>>) -> Self {
        Self { compilations }
    }

    pub fn is_empty(&self) -> bool {
        self.compilations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.compilations.len()
    }

    /// Applies the modulator for `position` to `object`.
    pub fn process_at(&self, position: usize, object: Value) -> Result<Value> {
        match self.compilations.len() {
            0 => Ok(object),
            len => self.compilations[position % len].map_object(object),
        }
    }
}
