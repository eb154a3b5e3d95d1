use crate::{
    Coefficient, Error, Result, Shared, Value,
    bytecode::{Instruction, Program},
    machine::Machine,
    processor::TraverserIter,
    query::Query,
    traverser::Traverser,
};

enum State<C: Coefficient> {
    Building(Program<C>),
    Running(TraverserIter<C>),
    Done,
}

/// A submitted (or about to be submitted) program and its results.
///
/// The program can be extended until the first result is requested. Iterating yields
/// each object once per unit of its traverser's coefficient.
pub struct Traversal<C: Coefficient> {
    machine: Shared<Machine<C>>,
    state: State<C>,
    peeked: Option<Result<Traverser<C>>>,
    pending: Option<(Shared<Value>, u64)>,
}

impl<C: Coefficient> Traversal<C> {
    pub fn new(machine: Shared<Machine<C>>, program: impl Into<Program<C>>) -> Self {
        Self {
            machine,
            state: State::Building(program.into()),
            peeked: None,
            pending: None,
        }
    }

    pub fn from_query(machine: Shared<Machine<C>>, query: Query<C>) -> Self {
        Self::new(machine, query)
    }

    /// Appends an instruction to the root bytecode.
    pub fn add_instruction(&mut self, instruction: Instruction<C>) -> Result<()> {
        match &mut self.state {
            State::Building(program) => {
                let root = program.root();
                program.add_instruction(root, instruction);
                Ok(())
            }
            State::Running(_) | State::Done => Err(Error::IllegalState),
        }
    }

    fn submit(&mut self) {
        if let State::Building(_) = self.state
            && let State::Building(program) = std::mem::replace(&mut self.state, State::Done)
        {
            match self.machine.submit(program) {
                Ok(results) => self.state = State::Running(results),
                Err(e) => self.peeked = Some(Err(e)),
            }
        }
    }

    fn pull(&mut self) -> Option<Result<Traverser<C>>> {
        self.submit();
        if let Some(peeked) = self.peeked.take() {
            return Some(peeked);
        }
        match &mut self.state {
            State::Running(results) => match results.next() {
                Some(next) => Some(next),
                None => {
                    self.state = State::Done;
                    None
                }
            },
            State::Building(_) | State::Done => None,
        }
    }

    /// Returns `true` if another object is available. Repeated calls do not consume results.
    ///
    /// Traversers with a zero count carry no objects and are skipped.
    pub fn has_next(&mut self) -> bool {
        if self.pending.is_some() || self.peeked.is_some() {
            return true;
        }
        loop {
            match self.pull() {
                Some(Ok(traverser)) if traverser.coefficient().count() == 0 => continue,
                next => {
                    self.peeked = next;
                    return self.peeked.is_some();
                }
            }
        }
    }

    /// The next traverser, without coefficient expansion.
    pub fn next_traverser(&mut self) -> Option<Result<Traverser<C>>> {
        self.pending = None;
        self.pull()
    }

    pub fn to_list(self) -> Result<Vec<Value>> {
        self.map(|object| object.map(|object| (*object).clone()))
            .collect()
    }

    /// Drains the results, discarding them.
    pub fn iterate(mut self) -> Result<()> {
        while let Some(next) = self.next_traverser() {
            next?;
        }
        Ok(())
    }
}

impl<C: Coefficient> Iterator for Traversal<C> {
    type Item = Result<Shared<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((object, remaining)) = &mut self.pending
                && *remaining > 0
            {
                *remaining -= 1;
                let object = Shared::clone(object);
                if *remaining == 0 {
                    self.pending = None;
                }
                return Some(Ok(object));
            }
            self.pending = None;

            match self.pull()? {
                Ok(traverser) => {
                    let count = traverser.coefficient().count();
                    self.pending = Some((Shared::clone(traverser.shared_object()), count));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
