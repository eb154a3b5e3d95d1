//! Steps for the non-branching function kinds.

use std::collections::VecDeque;

use tvm_core::{
    Coefficient, FunctionHeader, Result, Shared, Traverser, TraverserFactory, Value,
    function::{
        BarrierFunction, FilterFunction, FlatMapFunction, InitialFunction, MapFunction,
        ReduceFunction,
    },
};

use crate::step::{Produce, Pulled, Upstream};

/// Feeds the traversers a pipeline was started with.
pub(crate) struct StartStep<C: Coefficient> {
    starts: VecDeque<Traverser<C>>,
}

impl<C: Coefficient> StartStep<C> {
    pub(crate) fn new(starts: Vec<Traverser<C>>) -> Self {
        Self {
            starts: starts.into(),
        }
    }
}

impl<C: Coefficient> Produce<C> for StartStep<C> {
    fn produce(&mut self, _upstream: &mut Upstream<'_, C>) -> Pulled<C> {
        self.starts.pop_front().map(Ok)
    }

    fn clear(&mut self) {
        self.starts.clear();
    }
}

pub(crate) struct InitialStep<C: Coefficient> {
    header: FunctionHeader<C>,
    function: Shared<dyn InitialFunction>,
    factory: TraverserFactory,
    objects: Option<Box<dyn Iterator<Item = Value> + Send>>,
}

impl<C: Coefficient> InitialStep<C> {
    pub(crate) fn new(
        header: FunctionHeader<C>,
        function: Shared<dyn InitialFunction>,
        factory: TraverserFactory,
    ) -> Self {
        Self {
            header,
            function,
            factory,
            objects: None,
        }
    }
}

impl<C: Coefficient> Produce<C> for InitialStep<C> {
    fn produce(&mut self, _upstream: &mut Upstream<'_, C>) -> Pulled<C> {
        let objects = self.objects.get_or_insert_with(|| self.function.get());
        objects
            .next()
            .map(|object| Ok(self.factory.create(&self.header, object)))
    }

    fn clear(&mut self) {
        self.objects = None;
    }
}

pub(crate) struct MapStep<C: Coefficient> {
    header: FunctionHeader<C>,
    function: Shared<dyn MapFunction<C>>,
}

impl<C: Coefficient> MapStep<C> {
    pub(crate) fn new(header: FunctionHeader<C>, function: Shared<dyn MapFunction<C>>) -> Self {
        Self { header, function }
    }
}

impl<C: Coefficient> Produce<C> for MapStep<C> {
    fn produce(&mut self, upstream: &mut Upstream<'_, C>) -> Pulled<C> {
        let traverser = match upstream.next()? {
            Ok(traverser) => traverser,
            Err(e) => return Some(Err(e)),
        };
        Some(
            self.function
                .apply(&traverser)
                .map(|object| traverser.split(&self.header, object)),
        )
    }
}

pub(crate) struct FlatMapStep<C: Coefficient> {
    header: FunctionHeader<C>,
    function: Shared<dyn FlatMapFunction<C>>,
    buffer: VecDeque<Traverser<C>>,
}

impl<C: Coefficient> FlatMapStep<C> {
    pub(crate) fn new(header: FunctionHeader<C>, function: Shared<dyn FlatMapFunction<C>>) -> Self {
        Self {
            header,
            function,
            buffer: VecDeque::new(),
        }
    }
}

impl<C: Coefficient> Produce<C> for FlatMapStep<C> {
    fn produce(&mut self, upstream: &mut Upstream<'_, C>) -> Pulled<C> {
        loop {
            if let Some(traverser) = self.buffer.pop_front() {
                return Some(Ok(traverser));
            }
            let traverser = match upstream.next()? {
                Ok(traverser) => traverser,
                Err(e) => return Some(Err(e)),
            };
            match self.function.apply(&traverser) {
                Ok(objects) => self.buffer.extend(
                    objects
                        .into_iter()
                        .map(|object| traverser.split(&self.header, object)),
                ),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

pub(crate) struct FilterStep<C: Coefficient> {
    function: Shared<dyn FilterFunction<C>>,
}

impl<C: Coefficient> FilterStep<C> {
    pub(crate) fn new(function: Shared<dyn FilterFunction<C>>) -> Self {
        Self { function }
    }
}

impl<C: Coefficient> Produce<C> for FilterStep<C> {
    fn produce(&mut self, upstream: &mut Upstream<'_, C>) -> Pulled<C> {
        loop {
            let traverser = match upstream.next()? {
                Ok(traverser) => traverser,
                Err(e) => return Some(Err(e)),
            };
            match self.function.test(&traverser) {
                Ok(true) => return Some(Ok(traverser)),
                Ok(false) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Drains upstream into one accumulator and emits it once.
pub(crate) struct ReduceStep<C: Coefficient> {
    header: FunctionHeader<C>,
    function: Shared<dyn ReduceFunction<C>>,
    factory: TraverserFactory,
    done: bool,
}

impl<C: Coefficient> ReduceStep<C> {
    pub(crate) fn new(
        header: FunctionHeader<C>,
        function: Shared<dyn ReduceFunction<C>>,
        factory: TraverserFactory,
    ) -> Self {
        Self {
            header,
            function,
            factory,
            done: false,
        }
    }

    fn reduce(&self, upstream: &mut Upstream<'_, C>) -> Result<Traverser<C>> {
        let mut accumulator = self.function.initial_value();
        while let Some(traverser) = upstream.next() {
            accumulator = self.function.apply(&traverser?, accumulator)?;
        }
        Ok(self.factory.create(&self.header, accumulator))
    }
}

impl<C: Coefficient> Produce<C> for ReduceStep<C> {
    fn produce(&mut self, upstream: &mut Upstream<'_, C>) -> Pulled<C> {
        if self.done {
            return None;
        }
        self.done = true;
        Some(self.reduce(upstream))
    }

    fn clear(&mut self) {
        self.done = false;
    }
}

/// Drains upstream into a traverser set, then emits what the barrier releases.
pub(crate) struct BarrierStep<C: Coefficient> {
    function: Shared<dyn BarrierFunction<C>>,
    released: Option<VecDeque<Traverser<C>>>,
}

impl<C: Coefficient> BarrierStep<C> {
    pub(crate) fn new(function: Shared<dyn BarrierFunction<C>>) -> Self {
        Self {
            function,
            released: None,
        }
    }

    fn drain(&self, upstream: &mut Upstream<'_, C>) -> Result<VecDeque<Traverser<C>>> {
        let mut barrier = self.function.initial_value();
        while let Some(traverser) = upstream.next() {
            self.function.apply(traverser?, &mut barrier)?;
        }
        self.function.emit(barrier).map(VecDeque::from)
    }
}

impl<C: Coefficient> Produce<C> for BarrierStep<C> {
    fn produce(&mut self, upstream: &mut Upstream<'_, C>) -> Pulled<C> {
        if self.released.is_none() {
            match self.drain(upstream) {
                Ok(released) => self.released = Some(released),
                Err(e) => {
                    self.released = Some(VecDeque::new());
                    return Some(Err(e));
                }
            }
        }
        self.released.as_mut()?.pop_front().map(Ok)
    }

    fn clear(&mut self) {
        self.released = None;
    }
}
