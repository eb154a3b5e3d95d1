//! A thin fluent builder that emits [`Program`]s.
//!
//! ```rust,ignore
//! let program = Query::new()
//!     .inject([1, 2])
//!     .repeat(Query::new().incr())
//!     .times(3)
//!     .into_program();
//! ```

use smol_str::SmolStr;

use crate::{
    Coefficient, Shared, Value, symbol,
    bytecode::{Arg, Instruction, Program},
    compiler::BytecodeCompiler,
    processor::ProcessorFactory,
    strategy::Strategy,
    structure::StructureFactory,
};

/// Consuming builder for one query. Anonymous child queries passed as arguments
/// are grafted into this query's program.
#[derive(Debug, Clone)]
pub struct Query<C: Coefficient> {
    program: Program<C>,
}

impl<C: Coefficient> Default for Query<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Coefficient> Query<C> {
    pub fn new() -> Self {
        Self {
            program: Program::new(),
        }
    }

    pub fn program(&self) -> &Program<C> {
        &self.program
    }

    pub fn into_program(self) -> Program<C> {
        self.program
    }

    /// Appends an arbitrary instruction, e.g. an op contributed by a structure.
    pub fn instruction(mut self, op: &str, args: impl IntoIterator<Item = Arg<C>>) -> Self {
        let root = self.program.root();
        self.program.add_instruction(root, Instruction::new(op, args));
        self
    }

    fn child(&mut self, query: Query<C>) -> Arg<C> {
        let root = self.program.root();
        Arg::Bytecode(self.program.graft(root, query.program))
    }

    fn with_child(mut self, op: &str, query: Query<C>) -> Self {
        let arg = self.child(query);
        self.instruction(op, [arg])
    }

    fn update_last(&mut self, f: impl FnOnce(Instruction<C>) -> Instruction<C>) {
        let root = self.program.root();
        if let Some(last) = self.program.get_mut(root).instructions_mut().last_mut() {
            *last = f(last.clone());
        }
    }

    // sources

    pub fn with_id(mut self, id: impl Into<SmolStr>) -> Self {
        self.program.sources_mut().id = Some(id.into());
        self
    }

    pub fn with_processor(mut self, processor: Shared<dyn ProcessorFactory<C>>) -> Self {
        self.program.sources_mut().processor = Some(processor);
        self
    }

    pub fn with_structure(mut self, structure: Shared<dyn StructureFactory<C>>) -> Self {
        self.program.sources_mut().structure = Some(structure);
        self
    }

    pub fn with_strategy(mut self, strategy: Shared<dyn Strategy<C>>) -> Self {
        self.program.sources_mut().strategies.push(strategy);
        self
    }

    pub fn with_compiler(mut self, compiler: Shared<dyn BytecodeCompiler<C>>) -> Self {
        self.program.sources_mut().compilers.push(compiler);
        self
    }

    // modulators

    /// Labels the last instruction.
    pub fn as_(mut self, label: impl Into<SmolStr>) -> Self {
        let label = label.into();
        self.update_last(|i| i.with_label(Some(label)));
        self
    }

    /// Sets the coefficient of the last instruction.
    pub fn with_coefficient(mut self, coefficient: C) -> Self {
        self.update_last(|i| i.with_coefficient(coefficient));
        self
    }

    // initial

    pub fn inject<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        let args: Vec<Arg<C>> = values.into_iter().map(|v| Arg::Value(v.into())).collect();
        self.instruction(symbol::INJECT, args)
    }

    /// A deferred handle on the bound structure, resolved by a provider strategy.
    pub fn db(self) -> Self {
        self.instruction(symbol::DB, [])
    }

    // map

    pub fn identity(self) -> Self {
        self.instruction(symbol::MAP, [Arg::from(symbol::TRAVERSER_OBJECT)])
    }

    pub fn map(self, query: Query<C>) -> Self {
        self.with_child(symbol::MAP, query)
    }

    pub fn incr(self) -> Self {
        self.instruction(symbol::INCR, [])
    }

    pub fn constant(self, value: impl Into<Value>) -> Self {
        self.instruction(symbol::CONSTANT, [Arg::Value(value.into())])
    }

    pub fn loops(self) -> Self {
        self.instruction(symbol::LOOPS, [])
    }

    pub fn path(self) -> Self {
        self.instruction(symbol::PATH, [])
    }

    /// `path(labels... | by...)`.
    pub fn path_by<L: Into<SmolStr>>(
        mut self,
        labels: impl IntoIterator<Item = L>,
        by: impl IntoIterator<Item = Query<C>>,
    ) -> Self {
        let mut args: Vec<Arg<C>> = labels
            .into_iter()
            .map(|label| Arg::Value(Value::Str(label.into())))
            .collect();
        args.push(Arg::from(symbol::BY_SEPARATOR));
        for query in by {
            let arg = self.child(query);
            args.push(arg);
        }
        self.instruction(symbol::PATH, args)
    }

    // filter

    pub fn filter(self, query: Query<C>) -> Self {
        self.with_child(symbol::FILTER, query)
    }

    pub fn is(self, value: impl Into<Value>) -> Self {
        self.instruction(symbol::IS, [Arg::Value(value.into())])
    }

    /// `is` with one of `eq`, `neq`, `lt`, `lte`, `gt`, `gte`.
    pub fn is_cmp(self, compare: &str, value: impl Into<Value>) -> Self {
        self.instruction(symbol::IS, [Arg::from(compare), Arg::Value(value.into())])
    }

    // flat map

    pub fn unfold(self) -> Self {
        self.instruction(symbol::UNFOLD, [])
    }

    // reduce

    pub fn count(self) -> Self {
        self.instruction(symbol::COUNT, [])
    }

    pub fn sum(self) -> Self {
        self.instruction(symbol::SUM, [])
    }

    pub fn group_count(self) -> Self {
        self.instruction(symbol::GROUP_COUNT, [])
    }

    pub fn group_count_by(self, by: Query<C>) -> Self {
        self.with_child(symbol::GROUP_COUNT, by)
    }

    // barrier

    pub fn dedup(self) -> Self {
        self.instruction(symbol::DEDUP, [])
    }

    pub fn order(self) -> Self {
        self.instruction(symbol::ORDER, [])
    }

    pub fn order_desc(self) -> Self {
        self.instruction(symbol::ORDER, [Arg::from("desc")])
    }

    // branch

    pub fn union(mut self, queries: impl IntoIterator<Item = Query<C>>) -> Self {
        let args: Vec<Arg<C>> = queries.into_iter().map(|q| self.child(q)).collect();
        self.instruction(symbol::UNION, args)
    }

    pub fn choose(mut self, predicate: Query<C>, then: Query<C>, otherwise: Option<Query<C>>) -> Self {
        let mut args = vec![self.child(predicate), self.child(then)];
        if let Some(otherwise) = otherwise {
            args.push(self.child(otherwise));
        }
        self.instruction(symbol::CHOOSE, args)
    }

    // repeat

    /// Adds a `(flag, bytecode)` pair to the trailing `repeat` instruction, or starts a
    /// new one when there is none or the flag is already taken.
    fn repeat_part(mut self, flag: &str, query: Query<C>) -> Self {
        let root = self.program.root();
        let extend = self
            .program
            .get(root)
            .instructions()
            .last()
            .is_some_and(|last| {
                last.op() == symbol::REPEAT
                    && !last.args().iter().any(|arg| arg.as_str() == Some(flag))
            });

        let bytecode = self.child(query);
        if extend {
            self.update_last(|last| {
                let mut args = last.args().to_vec();
                args.push(Arg::from(flag));
                args.push(bytecode);
                last.with_args(args)
            });
            self
        } else {
            self.instruction(symbol::REPEAT, [Arg::from(flag), bytecode])
        }
    }

    pub fn repeat(self, body: Query<C>) -> Self {
        self.repeat_part(symbol::REPEAT_BODY, body)
    }

    /// Exits the loop once `predicate` yields. Placed before `repeat` it is tested
    /// before each pass, after `repeat` after each pass.
    pub fn until(self, predicate: Query<C>) -> Self {
        self.repeat_part(symbol::REPEAT_UNTIL, predicate)
    }

    /// Emits every traverser reaching this point of the loop.
    pub fn emit(self) -> Self {
        self.repeat_part(symbol::REPEAT_EMIT, Query::new())
    }

    /// Emits the traversers for which `predicate` yields, while they keep looping.
    pub fn emit_when(self, predicate: Query<C>) -> Self {
        self.repeat_part(symbol::REPEAT_EMIT, predicate)
    }

    /// Runs the loop body `times` times.
    pub fn times(self, times: i64) -> Self {
        self.until(Query::new().loops().is_cmp("gte", times))
    }
}

impl<C: Coefficient> From<Query<C>> for Program<C> {
    fn from(query: Query<C>) -> Self {
        query.into_program()
    }
}
