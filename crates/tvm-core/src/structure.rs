//! Backing-structure contract.
//!
//! A [`StructureFactory`] is bound to the root bytecode of a query. Provider
//! strategies ask it to [`mint`](StructureFactory::mint) an opaque
//! [`StructureHandle`] which then flows through the pipeline as a value.

pub mod memory;

use std::{
    any::Any,
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
};

use crate::{
    Coefficient, Result, Shared, compiler::BytecodeCompiler, strategy::Strategy,
};

pub use memory::{MemoryCompiler, MemoryStructure, MemoryStructureFactory};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(0);

/// A concrete resource minted for one execution.
pub trait Structure: Debug + Send + Sync + 'static {
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// Shared reference to a minted [`Structure`].
///
/// Handles compare, hash and order by identity only.
#[derive(Clone)]
pub struct StructureHandle {
    id: u64,
    structure: Shared<dyn Structure>,
}

impl StructureHandle {
    pub fn new<S: Structure>(structure: S) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, AtomicOrdering::Relaxed),
            structure: Shared::new(structure),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        self.structure.name()
    }

    pub fn downcast_ref<S: Structure>(&self) -> Option<&S> {
        self.structure.as_any().downcast_ref::<S>()
    }
}

impl PartialEq for StructureHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StructureHandle {}

impl Hash for StructureHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for StructureHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StructureHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Debug for StructureHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "StructureHandle({}#{})", self.structure.name(), self.id)
    }
}

impl Display for StructureHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.structure.name(), self.id)
    }
}

/// Mints structure handles and contributes the strategies and compilers of a backing structure.
pub trait StructureFactory<C: Coefficient>: Debug + Send + Sync {
    fn mint(&self) -> Result<StructureHandle>;

    fn strategies(&self) -> Vec<Shared<dyn Strategy<C>>> {
        Vec::new()
    }

    fn compilers(&self) -> Vec<Shared<dyn BytecodeCompiler<C>>> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Dummy;

    impl Structure for Dummy {
        fn name(&self) -> &str {
            "dummy"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_handles_compare_by_identity() {
        let a = StructureHandle::new(Dummy);
        let b = StructureHandle::new(Dummy);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a < b);
        assert!(a.downcast_ref::<Dummy>().is_some());
        assert_eq!(a.name(), "dummy");
    }
}
