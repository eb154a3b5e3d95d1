//! Reactive-push processor for the tvm machine.
//!
//! A compilation is translated once into a [`Plan`] of push stages and replayed for
//! every execution. Executions run on a dedicated thread by default, streaming results
//! back as they are produced. When [`RxConfig::pool_size`] is set, each query id is
//! served by a fixed-size [`WorkerPool`] taken from a [`PoolRegistry`]; a saturated pool
//! degrades the execution to serial instead of queuing it.
//!
//! ```rs
//! let factory = RxProcessorFactory::new(RxConfig::from_json(r#"{"rx.threadPool.size": 4}"#)?);
//! let machine = Shared::new(Machine::new().with_processor(Shared::new(factory)));
//! let query = Query::new().with_id("people").inject([1, 2, 3]).union([Query::new().incr(), Query::new().incr()]);
//! let values = Traversal::from_query(machine, query).to_list()?;
//! ```
mod config;
mod plan;
mod pool;
mod processor;
mod run;
mod strategy;

pub use config::{RxConfig, Scheduler};
pub use plan::Plan;
pub use pool::{PoolRegistry, WorkerPool};
pub use processor::{RxProcessor, RxProcessorFactory};
pub use strategy::RxStrategy;
