use std::{iter, thread};

use tracing::{debug, warn};
use tvm_core::{
    Coefficient, Compilation, Error, Processor, ProcessorFactory, Result, Shared, Strategy,
    Traverser, TraverserIter,
};

use crate::{
    config::{RxConfig, Scheduler},
    plan::Plan,
    pool::{PoolRegistry, WorkerPool},
    run,
    strategy::RxStrategy,
};

/// Replays a push graph built once from a compilation.
///
/// Without a pool every stage runs on one thread. With a pool, branch arms, repeat
/// bodies and a leading reduce are spread over its workers.
#[derive(Debug)]
pub struct RxProcessor<C: Coefficient> {
    plan: Shared<Plan<C>>,
    pool: Option<Shared<WorkerPool>>,
    scheduler: Scheduler,
}

impl<C: Coefficient> RxProcessor<C> {
    pub fn serial(compilation: &Compilation<C>, scheduler: Scheduler) -> Self {
        Self {
            plan: Shared::new(Plan::build(compilation)),
            pool: None,
            scheduler,
        }
    }

    pub fn parallel(compilation: &Compilation<C>, pool: Shared<WorkerPool>, scheduler: Scheduler) -> Self {
        Self {
            plan: Shared::new(Plan::build(compilation)),
            pool: Some(pool),
            scheduler,
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    pub fn plan(&self) -> &Plan<C> {
        &self.plan
    }

    /// Runs on a dedicated thread and hands results over as they are produced.
    ///
    /// Dropping the returned iterator stops the run at its next result.
    fn stream(&self, starts: Vec<Traverser<C>>) -> TraverserIter<C> {
        let plan = Shared::clone(&self.plan);
        let pool = self.pool.clone();
        let (sender, receiver) = crossbeam_channel::unbounded();

        let spawned = thread::Builder::new()
            .name("tvm-rx-exec".to_string())
            .spawn(move || {
                let result = run::execute(&plan, pool.as_deref(), starts, &mut |traverser| {
                    sender
                        .send(Ok(traverser))
                        .map_err(|_| Error::Processor("result receiver dropped".to_string()))
                });
                if let Err(e) = result {
                    let _ = sender.send(Err(e));
                }
            });

        match spawned {
            Ok(_) => Box::new(receiver.into_iter()),
            Err(e) => Box::new(iter::once(Err(Error::Processor(e.to_string())))),
        }
    }
}

impl<C: Coefficient> Processor<C> for RxProcessor<C> {
    fn iterator(&self, starts: Vec<Traverser<C>>) -> TraverserIter<C> {
        match self.scheduler {
            Scheduler::NewThread => self.stream(starts),
            Scheduler::Immediate => {
                let mut results = Vec::new();
                let outcome = run::execute(&self.plan, self.pool.as_deref(), starts, &mut |traverser| {
                    results.push(Ok(traverser));
                    Ok(())
                });
                if let Err(e) = outcome {
                    results.push(Err(e));
                }
                Box::new(results.into_iter())
            }
        }
    }
}

/// Mints [`RxProcessor`]s, pool-backed when the query's pool has a free worker.
///
/// # Example
///
/// ```rs
/// let factory = RxProcessorFactory::new(RxConfig::default().with_pool_size(4));
/// let machine = Machine::new().with_processor(Shared::new(factory));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RxProcessorFactory {
    config: RxConfig,
    registry: Shared<PoolRegistry>,
}

impl RxProcessorFactory {
    pub fn new(config: RxConfig) -> Self {
        Self {
            config,
            registry: Shared::new(PoolRegistry::new()),
        }
    }

    /// Shares `registry` with other factories, so they reuse each other's pools.
    pub fn with_registry(mut self, registry: Shared<PoolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &RxConfig {
        &self.config
    }

    pub fn registry(&self) -> &Shared<PoolRegistry> {
        &self.registry
    }

    /// Selects how `compilation` runs.
    ///
    /// Nested compilations always run serially on the caller's thread. A root
    /// compilation gets the pool registered under its query id, unless no pool is
    /// configured or every worker of that pool is busy, in which case it degrades to
    /// serial execution instead of waiting for a worker.
    pub fn processor<C: Coefficient>(&self, compilation: &Compilation<C>) -> Result<RxProcessor<C>> {
        if compilation.is_nested() {
            return Ok(RxProcessor::serial(compilation, Scheduler::Immediate));
        }

        let scheduler = self.config.scheduler;
        let id = match compilation.id() {
            Some(id) if self.config.pool_size > 0 => id,
            _ => return Ok(RxProcessor::serial(compilation, scheduler)),
        };

        let pool = self.registry.get_or_create(id, self.config.pool_size)?;
        if pool.is_saturated() {
            warn!(
                id = %id,
                active = pool.active_count(),
                max = pool.max(),
                "worker pool saturated, running serially"
            );
            return Ok(RxProcessor::serial(compilation, scheduler));
        }

        debug!(id = %id, max = pool.max(), "minting pool-backed rx processor");
        Ok(RxProcessor::parallel(compilation, pool, scheduler))
    }
}

impl<C: Coefficient> ProcessorFactory<C> for RxProcessorFactory {
    fn mint(&self, compilation: &Compilation<C>) -> Result<Box<dyn Processor<C>>> {
        Ok(Box::new(self.processor(compilation)?))
    }

    fn strategies(&self) -> Vec<Shared<dyn Strategy<C>>> {
        vec![Shared::new(RxStrategy)]
    }
}
