//! `tvm-core` is the core of a graph-traversal virtual machine.
//!
//! A query is an op-coded [`Program`], rewritten in place by [`Strategy`] passes,
//! compiled into a [`Compilation`] of functions and run by a pluggable processor
//! (see the `tvm-pipes` and `tvm-rx` crates).
//!
//! ## Examples
//!
//! ```rs
//! use tvm_core::{LongCoefficient, Machine, Query, Traversal};
//! use tvm_pipes::PipesProcessorFactory;
//!
//! let machine = Machine::new().with_processor(Shared::new(PipesProcessorFactory));
//! let query = Query::<LongCoefficient>::new().inject([1, 2, 3]).incr().sum();
//! let results = Traversal::from_query(Shared::new(machine), query).to_list().unwrap();
//!
//! assert_eq!(results, vec![Value::Int(9)]);
//! ```
pub mod arena;
pub mod bytecode;
pub mod coefficient;
pub mod compiler;
pub mod error;
pub mod function;
pub mod machine;
pub mod path;
pub mod processor;
pub mod query;
pub mod strategy;
pub mod structure;
pub mod symbol;
pub mod traversal;
pub mod traverser;
pub mod value;

pub use arena::{Arena, ArenaId};
pub use bytecode::{Arg, Bytecode, BytecodeId, Instruction, Program, Sources};
pub use coefficient::{Coefficient, LongCoefficient};
pub use compiler::{BytecodeCompiler, CompileContext, Compilation, CompilationCircle, Compiler, CoreCompiler};
pub use error::{Error, Result};
pub use function::{CFunction, FunctionHeader, FunctionKind};
pub use machine::{Machine, Options};
pub use path::{Path, Pop};
pub use processor::{Processor, ProcessorFactory, TraverserIter};
pub use query::Query;
pub use strategy::{Strategies, Strategy, StrategyKind};
pub use structure::{StructureFactory, StructureHandle};
pub use traversal::Traversal;
pub use traverser::{RepeatId, Traverser, TraverserFactory, TraverserSet};
pub use value::{Tuple, Value};

/// Thread-safe shared ownership used for payloads, functions and factories.
pub type Shared<T> = std::sync::Arc<T>;
