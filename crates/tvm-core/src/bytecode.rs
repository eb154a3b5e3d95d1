//! The machine's intermediate representation.
//!
//! A [`Program`] owns every [`Bytecode`] of a query in one arena: the root and all
//! nested sub-programs referenced from instruction arguments. Nested bytecodes point
//! at their parent by [`BytecodeId`], so resolving the root never walks pointers.
//!
//! ```text
//! Program
//!   #0 root      [inject(1, 2), map(#1), count]
//!   #1 parent=#0 [incr]
//! ```

use std::fmt::{self, Debug, Display, Formatter};

use itertools::Itertools;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::{
    Coefficient, Shared, Value,
    arena::{Arena, ArenaId},
    compiler::BytecodeCompiler,
    processor::ProcessorFactory,
    strategy::Strategy,
    structure::StructureFactory,
};

pub type BytecodeId<C> = ArenaId<Bytecode<C>>;

/// One instruction argument: a literal value or a nested bytecode.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg<C: Coefficient> {
    Value(Value),
    Bytecode(BytecodeId<C>),
}

impl<C: Coefficient> Arg<C> {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(value) => Some(value),
            Arg::Bytecode(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_bytecode(&self) -> Option<BytecodeId<C>> {
        match self {
            Arg::Bytecode(id) => Some(*id),
            Arg::Value(_) => None,
        }
    }
}

macro_rules! impl_arg_from {
    ($($ty:ty),*) => {
        $(
            impl<C: Coefficient> From<$ty> for Arg<C> {
                fn from(value: $ty) -> Self {
                    Arg::Value(value.into())
                }
            }
        )*
    };
}

impl_arg_from!(Value, bool, i32, i64, &str, String, SmolStr);

pub type Args<C> = SmallVec<[Arg<C>; 2]>;

/// An op-coded instruction. Instructions are replaced, never edited in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction<C: Coefficient> {
    coefficient: C,
    label: Option<SmolStr>,
    op: SmolStr,
    args: Args<C>,
}

impl<C: Coefficient> Instruction<C> {
    pub fn new(op: impl Into<SmolStr>, args: impl IntoIterator<Item = Arg<C>>) -> Self {
        Self {
            coefficient: C::one(),
            label: None,
            op: op.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn with_coefficient(mut self, coefficient: C) -> Self {
        self.coefficient = coefficient;
        self
    }

    pub fn with_label(mut self, label: Option<SmolStr>) -> Self {
        self.label = label;
        self
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = Arg<C>>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn coefficient(&self) -> &C {
        &self.coefficient
    }

    pub fn label(&self) -> Option<&SmolStr> {
        self.label.as_ref()
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn args(&self) -> &[Arg<C>] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&Arg<C>> {
        self.args.get(index)
    }

    fn offset_bytecodes(&mut self, offset: u32) {
        for arg in self.args.iter_mut() {
            if let Arg::Bytecode(id) = arg {
                *id = id.offset(offset);
            }
        }
    }
}

/// Resources bound to a query. Only the root bytecode carries them.
pub struct Sources<C: Coefficient> {
    pub id: Option<SmolStr>,
    pub processor: Option<Shared<dyn ProcessorFactory<C>>>,
    pub structure: Option<Shared<dyn StructureFactory<C>>>,
    pub strategies: Vec<Shared<dyn Strategy<C>>>,
    pub compilers: Vec<Shared<dyn BytecodeCompiler<C>>>,
}

impl<C: Coefficient> Default for Sources<C> {
    fn default() -> Self {
        Self {
            id: None,
            processor: None,
            structure: None,
            strategies: Vec::new(),
            compilers: Vec::new(),
        }
    }
}

impl<C: Coefficient> Clone for Sources<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            processor: self.processor.clone(),
            structure: self.structure.clone(),
            strategies: self.strategies.clone(),
            compilers: self.compilers.clone(),
        }
    }
}

impl<C: Coefficient> Debug for Sources<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sources")
            .field("id", &self.id)
            .field("processor", &self.processor)
            .field("structure", &self.structure)
            .field("strategies", &self.strategies.iter().map(|s| s.name()).collect_vec())
            .field("compilers", &self.compilers.iter().map(|c| c.name()).collect_vec())
            .finish()
    }
}

/// An ordered, mutable instruction sequence.
#[derive(Debug, Clone)]
pub struct Bytecode<C: Coefficient> {
    instructions: Vec<Instruction<C>>,
    parent: Option<BytecodeId<C>>,
    children: Vec<BytecodeId<C>>,
    sources: Sources<C>,
}

impl<C: Coefficient> Bytecode<C> {
    fn new(parent: Option<BytecodeId<C>>) -> Self {
        Self {
            instructions: Vec::new(),
            parent,
            children: Vec::new(),
            sources: Sources::default(),
        }
    }

    pub fn instructions(&self) -> &[Instruction<C>] {
        &self.instructions
    }

    /// Mutable access for rewrite passes.
    pub fn instructions_mut(&mut self) -> &mut Vec<Instruction<C>> {
        &mut self.instructions
    }

    pub fn add_instruction(&mut self, instruction: Instruction<C>) {
        self.instructions.push(instruction);
    }

    /// Replaces the first instruction equal to `old`. Returns `false` when none matched.
    pub fn replace_instruction(&mut self, old: &Instruction<C>, new: Instruction<C>) -> bool {
        match self.instructions.iter_mut().find(|i| *i == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }

    pub fn parent(&self) -> Option<BytecodeId<C>> {
        self.parent
    }

    pub fn children(&self) -> &[BytecodeId<C>] {
        &self.children
    }

    pub fn sources(&self) -> &Sources<C> {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }
}

/// Every bytecode of one query, rooted at [`Program::root`].
#[derive(Debug, Clone)]
pub struct Program<C: Coefficient> {
    bytecodes: Arena<Bytecode<C>>,
    root: BytecodeId<C>,
}

impl<C: Coefficient> Default for Program<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Coefficient> Program<C> {
    pub fn new() -> Self {
        let mut bytecodes = Arena::new(4);
        let root = bytecodes.alloc(Bytecode::new(None));
        Self { bytecodes, root }
    }

    pub fn root(&self) -> BytecodeId<C> {
        self.root
    }

    /// Resolves the root of the bytecode tree containing `id` through parent links.
    pub fn root_of(&self, id: BytecodeId<C>) -> BytecodeId<C> {
        let mut current = id;
        while let Some(parent) = self.bytecodes[current].parent {
            current = parent;
        }
        current
    }

    pub fn get(&self, id: BytecodeId<C>) -> &Bytecode<C> {
        &self.bytecodes[id]
    }

    pub fn get_mut(&mut self, id: BytecodeId<C>) -> &mut Bytecode<C> {
        &mut self.bytecodes[id]
    }

    pub fn bytecode_ids(&self) -> impl Iterator<Item = BytecodeId<C>> + use<C> {
        self.bytecodes.ids()
    }

    pub fn len(&self) -> usize {
        self.bytecodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytecodes.is_empty()
    }

    pub fn sources(&self) -> &Sources<C> {
        &self.bytecodes[self.root].sources
    }

    pub fn sources_mut(&mut self) -> &mut Sources<C> {
        let root = self.root;
        &mut self.bytecodes[root].sources
    }

    pub fn add_instruction(&mut self, id: BytecodeId<C>, instruction: Instruction<C>) {
        self.bytecodes[id].add_instruction(instruction);
    }

    /// Allocates an empty bytecode nested under `parent`.
    pub fn add_child(&mut self, parent: BytecodeId<C>) -> BytecodeId<C> {
        let child = self.bytecodes.alloc(Bytecode::new(Some(parent)));
        self.bytecodes[parent].children.push(child);
        child
    }

    /// Moves every bytecode of `other` into this program under `parent`.
    ///
    /// Returns the new id of `other`'s root. Sources bound to `other` are dropped,
    /// a nested bytecode resolves them from this program's root.
    pub fn graft(&mut self, parent: BytecodeId<C>, other: Program<C>) -> BytecodeId<C> {
        let offset = self.bytecodes.len() as u32;
        let other_root = other.root;

        for (index, mut bytecode) in other.bytecodes.into_items().into_iter().enumerate() {
            let id: BytecodeId<C> = ArenaId::new(index as u32);
            bytecode.parent = if id == other_root {
                Some(parent)
            } else {
                bytecode.parent.map(|p| p.offset(offset))
            };
            bytecode.children = bytecode.children.iter().map(|c| c.offset(offset)).collect();
            bytecode
                .instructions
                .iter_mut()
                .for_each(|i| i.offset_bytecodes(offset));
            bytecode.sources = Sources::default();
            self.bytecodes.alloc(bytecode);
        }

        let grafted = other_root.offset(offset);
        self.bytecodes[parent].children.push(grafted);
        grafted
    }

    /// Returns `true` if any bytecode of the program satisfies `predicate` for one of its instructions.
    pub fn any_instruction(&self, predicate: impl Fn(&Instruction<C>) -> bool) -> bool {
        self.bytecodes
            .iter()
            .any(|(_, bytecode)| bytecode.instructions.iter().any(&predicate))
    }

    fn fmt_bytecode(&self, id: BytecodeId<C>, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, instruction) in self.bytecodes[id].instructions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if !instruction.coefficient.is_unity() {
                write!(f, "{:?}", instruction.coefficient)?;
            }
            write!(f, "{}", instruction.op)?;
            if !instruction.args.is_empty() {
                write!(f, "(")?;
                for (j, arg) in instruction.args.iter().enumerate() {
                    if j > 0 {
                        write!(f, ", ")?;
                    }
                    match arg {
                        Arg::Value(value) => write!(f, "{}", value)?,
                        Arg::Bytecode(child) => self.fmt_bytecode(*child, f)?,
                    }
                }
                write!(f, ")")?;
            }
            if let Some(label) = &instruction.label {
                write!(f, "@{}", label)?;
            }
        }
        write!(f, "]")
    }
}

impl<C: Coefficient> Display for Program<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.fmt_bytecode(self.root, f)
    }
}
