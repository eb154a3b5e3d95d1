//! Control-flow functions: branch routing and the repeat loop.

use tracing::trace;

use crate::{
    Coefficient, Error, Result, Shared, Value, symbol,
    bytecode::{Arg, Instruction},
    compiler::{Compilation, CompileContext},
    function::FunctionKind,
    traverser::{RepeatId, Traverser},
};

/// One arm of a [`BranchFunction`]. A `None` predicate marks a default arm.
#[derive(Debug)]
pub struct Branch<C: Coefficient> {
    pub predicate: Option<Shared<Compilation<C>>>,
    pub compilations: Vec<Shared<Compilation<C>>>,
}

/// Routes each traverser to the sub-compilations of every matching arm.
#[derive(Debug)]
pub struct BranchFunction<C: Coefficient> {
    branches: Vec<Branch<C>>,
}

impl<C: Coefficient> BranchFunction<C> {
    pub fn new(branches: Vec<Branch<C>>) -> Self {
        Self { branches }
    }

    pub fn branches(&self) -> &[Branch<C>] {
        &self.branches
    }

    /// Every sub-compilation referenced by any arm, predicates excluded.
    pub fn compilations(&self) -> impl Iterator<Item = &Shared<Compilation<C>>> {
        self.branches.iter().flat_map(|branch| branch.compilations.iter())
    }

    /// Selects the sub-compilations `traverser` is routed to, in registration order.
    ///
    /// Predicated arms are tested first; default arms are taken only when none matched.
    /// The caller clones the traverser once per returned compilation.
    pub fn route(&self, traverser: &Traverser<C>) -> Result<Vec<&Shared<Compilation<C>>>> {
        let mut routed = Vec::new();
        let mut matched = false;

        for branch in &self.branches {
            if let Some(predicate) = &branch.predicate
                && predicate.filter_traverser(traverser)?
            {
                matched = true;
                routed.extend(branch.compilations.iter());
            }
        }

        if !matched {
            routed.extend(
                self.branches
                    .iter()
                    .filter(|branch| branch.predicate.is_none())
                    .flat_map(|branch| branch.compilations.iter()),
            );
        }

        trace!(traverser = %traverser, routes = routed.len(), "branch routed");
        Ok(routed)
    }

    /// `union(bytecode...)`: every traverser goes to every sub-compilation.
    pub(crate) fn compile_union(
        instruction: &Instruction<C>,
        cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        let compilations = instruction
            .args()
            .iter()
            .map(|arg| cx.nested(instruction.op(), arg))
            .collect::<Result<Vec<_>>>()?;
        Ok(FunctionKind::Branch(Shared::new(Self::new(vec![Branch {
            predicate: None,
            compilations,
        }]))))
    }

    /// `choose(predicate, then [, otherwise])`.
    pub(crate) fn compile_choose(
        instruction: &Instruction<C>,
        cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        let op = instruction.op();
        let mut branches = match instruction.args() {
            [predicate, then] | [predicate, then, _] => vec![Branch {
                predicate: Some(cx.nested(op, predicate)?),
                compilations: vec![cx.nested(op, then)?],
            }],
            _ => {
                return Err(Error::invalid_arguments(
                    op,
                    "expected a predicate, a branch and an optional default branch",
                ));
            }
        };
        if let Some(otherwise) = instruction.arg(2) {
            branches.push(Branch {
                predicate: None,
                compilations: vec![cx.nested(op, otherwise)?],
            });
        }
        Ok(FunctionKind::Branch(Shared::new(Self::new(branches))))
    }
}

/// Where a repeat predicate is evaluated relative to a pass through the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Before,
    After,
}

/// Outcome of a repeat test: a traverser may leave the loop, continue it, or both.
#[derive(Debug)]
pub struct RepeatRoute<C: Coefficient> {
    pub exit: Option<Traverser<C>>,
    pub again: Option<Traverser<C>>,
}

/// The repeat/until/emit loop.
#[derive(Debug)]
pub struct RepeatBranch<C: Coefficient> {
    id: RepeatId,
    body: Shared<Compilation<C>>,
    until: Option<(Shared<Compilation<C>>, Location)>,
    emit: Option<(Shared<Compilation<C>>, Location)>,
}

impl<C: Coefficient> RepeatBranch<C> {
    pub fn new(
        id: RepeatId,
        body: Shared<Compilation<C>>,
        until: Option<(Shared<Compilation<C>>, Location)>,
        emit: Option<(Shared<Compilation<C>>, Location)>,
    ) -> Self {
        Self {
            id,
            body,
            until,
            emit,
        }
    }

    pub fn id(&self) -> RepeatId {
        self.id
    }

    pub fn body(&self) -> &Shared<Compilation<C>> {
        &self.body
    }

    pub fn until(&self) -> Option<&(Shared<Compilation<C>>, Location)> {
        self.until.as_ref()
    }

    pub fn emit(&self) -> Option<&(Shared<Compilation<C>>, Location)> {
        self.emit.as_ref()
    }

    fn test(
        slot: &Option<(Shared<Compilation<C>>, Location)>,
        location: Location,
        traverser: &Traverser<C>,
    ) -> Result<bool> {
        match slot {
            Some((compilation, at)) if *at == location => compilation.filter_traverser(traverser),
            _ => Ok(false),
        }
    }

    /// Routes a traverser arriving at the loop, fresh or requeued.
    pub fn before(&self, traverser: Traverser<C>) -> Result<RepeatRoute<C>> {
        let traverser = traverser.repeat_enter(self.id);
        if Self::test(&self.until, Location::Before, &traverser)? {
            return Ok(RepeatRoute {
                exit: Some(traverser.repeat_done(self.id)),
                again: None,
            });
        }

        let exit = Self::test(&self.emit, Location::Before, &traverser)?
            .then(|| traverser.repeat_done(self.id));
        Ok(RepeatRoute {
            exit,
            again: Some(traverser),
        })
    }

    /// Routes a traverser that completed a pass through the body.
    ///
    /// An until that fires replaces the emission instead of adding to it.
    pub fn after(&self, traverser: Traverser<C>) -> Result<RepeatRoute<C>> {
        let traverser = traverser.repeat_loop(self.id);
        trace!(repeat = ?self.id, loops = traverser.loops(), "repeat pass completed");

        if Self::test(&self.until, Location::After, &traverser)? {
            return Ok(RepeatRoute {
                exit: Some(traverser.repeat_done(self.id)),
                again: None,
            });
        }

        let exit = Self::test(&self.emit, Location::After, &traverser)?
            .then(|| traverser.repeat_done(self.id));
        Ok(RepeatRoute {
            exit,
            again: Some(traverser),
        })
    }

    /// `repeat` args are `(flag, bytecode)` pairs with flags `until`, `emit` and `repeat`.
    ///
    /// An `until` or `emit` placed before the `repeat` pair is tested before each pass,
    /// one placed after it is tested after each pass.
    pub(crate) fn compile(
        instruction: &Instruction<C>,
        cx: &CompileContext<'_, C>,
    ) -> Result<FunctionKind<C>> {
        let op = instruction.op();
        let invalid = |reason: &str| Error::invalid_arguments(op, reason.to_string());

        let mut body = None;
        let mut until = None;
        let mut emit = None;

        for pair in instruction.args().chunks(2) {
            let [flag, bytecode] = pair else {
                return Err(invalid("expected (flag, bytecode) pairs"));
            };
            let location = if body.is_some() {
                Location::After
            } else {
                Location::Before
            };
            let slot = match flag {
                Arg::Value(Value::Str(flag)) if flag == symbol::REPEAT_BODY => &mut body,
                Arg::Value(Value::Str(flag)) if flag == symbol::REPEAT_UNTIL => &mut until,
                Arg::Value(Value::Str(flag)) if flag == symbol::REPEAT_EMIT => &mut emit,
                _ => return Err(invalid("unknown repeat flag")),
            };
            if slot.is_some() {
                return Err(invalid("duplicate repeat flag"));
            }
            *slot = Some((cx.nested(op, bytecode)?, location));
        }

        let (body, _) = body.ok_or_else(|| invalid("missing repeat body"))?;
        Ok(FunctionKind::Repeat(Shared::new(Self::new(
            cx.next_repeat_id(),
            body,
            until,
            emit,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        LongCoefficient,
        function::{
            CFunction, FilterFunction, FunctionHeader,
            filter::{Compare, IsFilter},
        },
        processor::{Processor, ProcessorFactory, TraverserIter},
        traverser::TraverserFactory,
    };
    use rstest::rstest;

    type L = LongCoefficient;

    /// Passes a traverser through every filter of its compilation, ignoring other functions.
    #[derive(Debug)]
    struct FilterOnly(Vec<Shared<dyn FilterFunction<L>>>);

    impl Processor<L> for FilterOnly {
        fn iterator(&self, starts: Vec<Traverser<L>>) -> TraverserIter<L> {
            let filters = self.0.clone();
            Box::new(starts.into_iter().filter_map(move |traverser| {
                filters
                    .iter()
                    .try_fold(true, |pass, filter| Ok::<_, Error>(pass && filter.test(&traverser)?))
                    .map(|pass| pass.then_some(traverser))
                    .transpose()
            }))
        }
    }

    #[derive(Debug)]
    struct FilterOnlyFactory;

    impl ProcessorFactory<L> for FilterOnlyFactory {
        fn mint(&self, compilation: &Compilation<L>) -> Result<Box<dyn Processor<L>>> {
            let filters = compilation
                .functions()
                .iter()
                .filter_map(|function| match function.kind() {
                    FunctionKind::Filter(filter) => Some(Shared::clone(filter)),
                    _ => None,
                })
                .collect();
            Ok(Box::new(FilterOnly(filters)))
        }
    }

    #[derive(Debug)]
    struct LoopsAtLeast(u64);

    impl FilterFunction<L> for LoopsAtLeast {
        fn test(&self, traverser: &Traverser<L>) -> Result<bool> {
            Ok(traverser.loops() >= self.0)
        }
    }

    fn compilation(filters: Vec<Shared<dyn FilterFunction<L>>>) -> Shared<Compilation<L>> {
        let functions = filters
            .into_iter()
            .map(|filter| {
                CFunction::new(
                    FunctionHeader::new(symbol::FILTER, None, L::new(1)),
                    FunctionKind::Filter(filter),
                )
            })
            .collect();
        Shared::new(Compilation::new(
            functions,
            TraverserFactory::Co,
            Shared::new(FilterOnlyFactory),
            true,
        ))
    }

    fn is(compare: Compare, operand: i64) -> Shared<dyn FilterFunction<L>> {
        Shared::new(IsFilter::new(compare, operand.into()))
    }

    fn traverser(object: i64) -> Traverser<L> {
        TraverserFactory::Co.create(&FunctionHeader::new(symbol::INJECT, None, L::new(1)), object.into())
    }

    #[rstest]
    #[case::first_only(1, &[0])]
    #[case::both_predicated(2, &[0, 1])]
    #[case::second_only(5, &[1])]
    #[case::defaults(9, &[2, 3])]
    fn test_route(#[case] object: i64, #[case] expected: &[usize]) {
        let arms: Vec<_> = (0..4).map(|_| compilation(Vec::new())).collect();
        let branch = BranchFunction::new(vec![
            Branch {
                predicate: Some(compilation(vec![is(Compare::Lt, 3)])),
                compilations: vec![Shared::clone(&arms[0])],
            },
            Branch {
                predicate: Some(compilation(vec![is(Compare::Gte, 2), is(Compare::Lte, 6)])),
                compilations: vec![Shared::clone(&arms[1])],
            },
            Branch {
                predicate: None,
                compilations: vec![Shared::clone(&arms[2]), Shared::clone(&arms[3])],
            },
        ]);

        let routed: Vec<usize> = branch
            .route(&traverser(object))
            .unwrap()
            .into_iter()
            .filter_map(|routed| arms.iter().position(|arm| Shared::ptr_eq(arm, routed)))
            .collect();
        assert_eq!(routed, expected);
    }

    #[test]
    fn test_route_without_default_drops_unmatched() {
        let branch = BranchFunction::new(vec![Branch {
            predicate: Some(compilation(vec![is(Compare::Eq, 1)])),
            compilations: vec![compilation(Vec::new())],
        }]);
        assert_eq!(branch.route(&traverser(2)).map(|routed| routed.len()), Ok(0));
        assert_eq!(branch.route(&traverser(1)).map(|routed| routed.len()), Ok(1));
    }

    #[test]
    fn test_inner_repeat_counts_from_zero() {
        let outer = RepeatId(0);
        let inner = RepeatBranch::new(
            RepeatId(1),
            compilation(Vec::new()),
            Some((compilation(vec![Shared::new(LoopsAtLeast(1))]), Location::Before)),
            None,
        );
        let start = traverser(0).repeat_loop(outer).repeat_loop(outer);

        let first = inner.before(start.clone()).unwrap();
        assert!(first.exit.is_none());
        let looping = first.again.unwrap();
        assert_eq!(looping.loops(), 0);

        let passed = inner.after(looping).unwrap();
        assert!(passed.exit.is_none());
        let second = inner.before(passed.again.unwrap()).unwrap();
        assert!(second.again.is_none());
        assert_eq!(second.exit, Some(start));
    }

    #[rstest]
    #[case::until_fires(Location::After, None, true, false)]
    #[case::emit_fires(Location::Before, Some(Location::After), true, true)]
    #[case::nothing_fires(Location::Before, Some(Location::Before), false, true)]
    fn test_after(
        #[case] until_at: Location,
        #[case] emit_at: Option<Location>,
        #[case] exits: bool,
        #[case] again: bool,
    ) {
        let repeat = RepeatBranch::new(
            RepeatId(0),
            compilation(Vec::new()),
            Some((compilation(vec![Shared::new(LoopsAtLeast(1))]), until_at)),
            emit_at.map(|at| (compilation(Vec::new()), at)),
        );

        let route = repeat.after(traverser(0)).unwrap();
        assert_eq!(route.exit.is_some(), exits);
        assert_eq!(route.again.as_ref().map(Traverser::loops), again.then_some(1));
        assert!(route.exit.iter().all(|exit| exit.loops() == 0));
    }
}
