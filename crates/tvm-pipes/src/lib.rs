//! `tvm-pipes` is the single-threaded, pull-based processor of the tvm machine.
//!
//! Each compiled function becomes one step; results are produced only as the caller
//! pulls them, so abandoning the iterator cancels the execution.
mod branch;
mod pipeline;
mod processor;
mod repeat;
mod step;
mod steps;

pub use pipeline::Pipeline;
pub use processor::{PipesProcessor, PipesProcessorFactory};
pub use step::{Pulled, Step, Upstream};
