// SPDX-License-Identifier: MPL-2.0

//! The partial solution is the running set of decisions and derivations made
//! so far, organized by package and historically ordered, so backtracking and
//! conflict resolution can reason about "what did we know, and when".

use std::fmt::{self, Display};
use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

use crate::internal::arena::Arena;
use crate::internal::incompatibility::{IncompId, Incompatibility, Relation};
use crate::internal::small_vec::SmallVec;
use crate::package::Package;
use crate::requirement::Requirement;
use crate::revision::Revision;
use crate::term::Term;
use crate::version::Version;

type FxIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// How many decisions deep the solver currently is. Level 0 is "no decision
/// made yet"; each [PartialSolution::decide] increments it by one.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub(crate) struct DecisionLevel(pub(crate) u32);

impl DecisionLevel {
    pub(crate) fn increment(self) -> Self {
        Self(self.0 + 1)
    }
}

/// All package assignments, organized by package and historically ordered.
///
/// `package_assignments` keeps two sections in order: `[..current_decision_level]`
/// holds every package with a decision, sorted by the decision level at which
/// it was made (so extracting the solution or backtracking is a cheap prefix
/// operation); the rest holds packages with derivations only, in no
/// particular order.
#[derive(Clone, Debug)]
pub(crate) struct PartialSolution<P: Package, V: Version, R: Revision> {
    next_global_index: u32,
    current_decision_level: DecisionLevel,
    package_assignments: FxIndexMap<P, PackageAssignments<P, V, R>>,
}

impl<P: Package, V: Version, R: Revision> Display for PartialSolution<P, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut assignments: Vec<_> = self
            .package_assignments
            .iter()
            .map(|(p, pa)| format!("{}: {}", p, pa))
            .collect();
        assignments.sort();
        write!(
            f,
            "next_global_index: {}\ncurrent_decision_level: {:?}\npackage_assignments:\n{}",
            self.next_global_index,
            self.current_decision_level,
            assignments.join("\n")
        )
    }
}

/// The potential decision and derivations already made for a given package,
/// plus the intersection of all of those.
#[derive(Clone, Debug)]
struct PackageAssignments<P: Package, V: Version, R: Revision> {
    smallest_decision_level: DecisionLevel,
    highest_decision_level: DecisionLevel,
    dated_derivations: SmallVec<DatedDerivation<P, V, R>>,
    assignments_intersection: AssignmentsIntersection<P, V, R>,
}

impl<P: Package, V: Version, R: Revision> Display for PackageAssignments<P, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let derivations: Vec<_> = self
            .dated_derivations
            .iter()
            .map(|dd| dd.to_string())
            .collect();
        write!(
            f,
            "decision range: {:?}..{:?}\nderivations:\n  {}\nassignments_intersection: {}",
            self.smallest_decision_level,
            self.highest_decision_level,
            derivations.join("\n  "),
            self.assignments_intersection
        )
    }
}

#[derive(Clone, Debug)]
struct DatedDerivation<P: Package, V: Version, R: Revision> {
    global_index: u32,
    decision_level: DecisionLevel,
    cause: IncompId<P, V, R>,
    accumulated_intersection: Term<P, V, R>,
}

impl<P: Package, V: Version, R: Revision> Display for DatedDerivation<P, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}, cause: {:?}", self.decision_level, self.cause)
    }
}

#[derive(Clone, Debug)]
enum AssignmentsIntersection<P: Package, V: Version, R: Revision> {
    Decision {
        global_index: u32,
        term: Term<P, V, R>,
    },
    Derivations(Term<P, V, R>),
}

impl<P: Package, V: Version, R: Revision> AssignmentsIntersection<P, V, R> {
    /// The term intersection of all assignments, decision included.
    fn term(&self) -> &Term<P, V, R> {
        match self {
            Self::Decision { term, .. } => term,
            Self::Derivations(term) => term,
        }
    }

    /// A package is a potential pick if it has no decision yet and has at
    /// least one positive derivation term.
    fn unsatisfied_term(&self) -> Option<&Term<P, V, R>> {
        match self {
            Self::Decision { .. } => None,
            Self::Derivations(term) if term.is_positive() => Some(term),
            Self::Derivations(_) => None,
        }
    }
}

impl<P: Package, V: Version, R: Revision> Display for AssignmentsIntersection<P, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decision { global_index, term } => {
                write!(f, "Decision: global index {global_index}, {term}")
            }
            Self::Derivations(term) => write!(f, "Derivations term: {term}"),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum SatisfierSearch<P: Package, V: Version, R: Revision> {
    DifferentDecisionLevels {
        previous_satisfier_level: DecisionLevel,
    },
    SameDecisionLevels {
        satisfier_cause: IncompId<P, V, R>,
    },
}

/// A term that can never be satisfied, used as a stand-in wherever the old
/// always-total `VersionSet` intersection used to fall back to its `Empty`
/// variant, now that [Term::intersect] returns `None` on contradiction.
fn empty_term<P: Package, V: Version, R: Revision>(package: P) -> Term<P, V, R> {
    Term::positive(package, Requirement::none())
}

/// A tiny linear-scan map, adequate since the number of packages mentioned by
/// a single incompatibility rarely exceeds a handful.
struct SatisfiedMap<'i, P, V: Version, R: Revision>(
    Vec<(&'i P, (Option<IncompId<P, V, R>>, u32, DecisionLevel))>,
);

impl<'i, P: Package, V: Version, R: Revision> SatisfiedMap<'i, P, V, R> {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn insert(&mut self, package: &'i P, value: (Option<IncompId<P, V, R>>, u32, DecisionLevel)) {
        if let Some(slot) = self.0.iter_mut().find(|(p, _)| *p == package) {
            slot.1 = value;
        } else {
            self.0.push((package, value));
        }
    }

    fn get(&self, package: &P) -> Option<&(Option<IncompId<P, V, R>>, u32, DecisionLevel)> {
        self.0.iter().find(|(p, _)| *p == package).map(|(_, v)| v)
    }

    fn latest(&self) -> (&'i P, &(Option<IncompId<P, V, R>>, u32, DecisionLevel)) {
        self.0
            .iter()
            .max_by_key(|(_, (_, global_index, _))| *global_index)
            .map(|(p, v)| (*p, v))
            .expect("satisfied map must not be empty")
    }
}

impl<P: Package, V: Version, R: Revision> PartialSolution<P, V, R> {
    pub(crate) fn empty() -> Self {
        Self {
            next_global_index: 0,
            current_decision_level: DecisionLevel(0),
            package_assignments: FxIndexMap::default(),
        }
    }

    /// Record that `package` has been decided to target exactly `term`
    /// (usually `positive(package, exact(version))`, but a revision or
    /// unversioned decision carries its own singleton term instead).
    pub(crate) fn decide(&mut self, package: P, term: Term<P, V, R>) {
        if cfg!(debug_assertions) {
            debug_assert!(term.is_positive(), "a decision must be a positive term");
            match self.package_assignments.get(&package) {
                None => panic!("derivations must already exist for {package}"),
                Some(pa) => match &pa.assignments_intersection {
                    AssignmentsIntersection::Decision { .. } => {
                        panic!("{package} already has a decision")
                    }
                    AssignmentsIntersection::Derivations(running) => {
                        debug_assert!(
                            running.intersect(&term).is_some(),
                            "{package}: {term} was expected to be compatible with {running}"
                        )
                    }
                },
            }
        }
        let new_idx = self.current_decision_level.0 as usize;
        self.current_decision_level = self.current_decision_level.increment();
        let (old_idx, _, pa) = self
            .package_assignments
            .get_full_mut(&package)
            .expect("derivations must already exist");
        pa.highest_decision_level = self.current_decision_level;
        pa.assignments_intersection = AssignmentsIntersection::Decision {
            global_index: self.next_global_index,
            term,
        };
        if new_idx != old_idx {
            self.package_assignments.swap_indices(new_idx, old_idx);
        }
        self.next_global_index += 1;
    }

    /// Record a derivation: `package` is implied by the negation of the term
    /// that `cause` (an incompatibility) holds about it.
    pub(crate) fn derive(
        &mut self,
        package: P,
        cause: IncompId<P, V, R>,
        store: &Arena<Incompatibility<P, V, R>>,
    ) {
        use indexmap::map::Entry;
        let new_term = store[cause]
            .get(&package)
            .expect("the cause incompatibility must mention package")
            .inverse();
        let mut dated_derivation = DatedDerivation {
            global_index: self.next_global_index,
            decision_level: self.current_decision_level,
            cause,
            accumulated_intersection: new_term,
        };
        self.next_global_index += 1;
        match self.package_assignments.entry(package.clone()) {
            Entry::Occupied(mut occupied) => {
                let pa = occupied.get_mut();
                pa.highest_decision_level = self.current_decision_level;
                match &mut pa.assignments_intersection {
                    AssignmentsIntersection::Decision { .. } => {
                        panic!("derive should not be called after a decision")
                    }
                    AssignmentsIntersection::Derivations(t) => {
                        let folded = t
                            .intersect(&dated_derivation.accumulated_intersection)
                            .unwrap_or_else(|| empty_term(package));
                        *t = folded.clone();
                        dated_derivation.accumulated_intersection = folded;
                    }
                }
                pa.dated_derivations.push(dated_derivation);
            }
            Entry::Vacant(v) => {
                let term = dated_derivation.accumulated_intersection.clone();
                let mut dated_derivations = SmallVec::empty();
                dated_derivations.push(dated_derivation);
                v.insert(PackageAssignments {
                    smallest_decision_level: self.current_decision_level,
                    highest_decision_level: self.current_decision_level,
                    dated_derivations,
                    assignments_intersection: AssignmentsIntersection::Derivations(term),
                });
            }
        }
    }

    /// Every package with a positive derivation term and no decision yet: the
    /// pool [crate::solver] picks the next candidate from.
    pub(crate) fn unsatisfied(&self) -> impl Iterator<Item = (&P, &Term<P, V, R>)> {
        self.package_assignments
            .iter()
            .skip(self.current_decision_level.0 as usize)
            .filter_map(|(p, pa)| pa.assignments_intersection.unsatisfied_term().map(|t| (p, t)))
    }

    /// If every positive derivation has a matching decision, solving has
    /// succeeded: the decided prefix is the solution.
    pub(crate) fn decided_assignments(&self) -> Vec<(P, Term<P, V, R>)> {
        self.package_assignments
            .iter()
            .take(self.current_decision_level.0 as usize)
            .map(|(p, pa)| match &pa.assignments_intersection {
                AssignmentsIntersection::Decision { term, .. } => (p.clone(), term.clone()),
                AssignmentsIntersection::Derivations(_) => {
                    unreachable!("derivations in the decision prefix")
                }
            })
            .collect()
    }

    /// Backtrack to a given decision level, dropping every later decision and
    /// derivation and resetting running intersections along the way.
    pub(crate) fn backtrack(&mut self, decision_level: DecisionLevel) {
        self.current_decision_level = decision_level;
        self.package_assignments.retain(|_p, pa| {
            if pa.smallest_decision_level > decision_level {
                false
            } else if pa.highest_decision_level <= decision_level {
                true
            } else {
                while pa
                    .dated_derivations
                    .last()
                    .map(|dd| dd.decision_level)
                    > Some(decision_level)
                {
                    pa.dated_derivations.pop();
                }
                debug_assert!(!pa.dated_derivations.is_empty());
                let last = pa.dated_derivations.last().unwrap();
                pa.highest_decision_level = last.decision_level;
                pa.assignments_intersection =
                    AssignmentsIntersection::Derivations(last.accumulated_intersection.clone());
                true
            }
        });
    }

    /// Check how the terms currently in the partial solution relate to an
    /// incompatibility.
    pub(crate) fn relation(&self, incompat: &Incompatibility<P, V, R>) -> Relation<P> {
        incompat.relation(|package| self.term_intersection_for_package(package).cloned())
    }

    /// Retrieve the intersection of terms known about a package.
    pub(crate) fn term_intersection_for_package(&self, package: &P) -> Option<&Term<P, V, R>> {
        self.package_assignments
            .get(package)
            .map(|pa| pa.assignments_intersection.term())
    }

    pub(crate) fn current_decision_level(&self) -> DecisionLevel {
        self.current_decision_level
    }

    /// Find the earliest assignment in history such that the incompatibility
    /// is satisfied by the partial solution up to and including it, and
    /// whether its decision level agrees with the previous satisfier's.
    pub(crate) fn satisfier_search<'i>(
        &self,
        incompat: &'i Incompatibility<P, V, R>,
        store: &Arena<Incompatibility<P, V, R>>,
    ) -> (&'i P, SatisfierSearch<P, V, R>) {
        let satisfied_map = Self::find_satisfier(incompat, &self.package_assignments);
        let (satisfier_package, &(satisfier_cause, _, satisfier_decision_level)) =
            satisfied_map.latest();
        let previous_satisfier_level = Self::find_previous_satisfier(
            incompat,
            satisfier_package,
            satisfied_map,
            &self.package_assignments,
            store,
        );
        let search_result = if previous_satisfier_level >= satisfier_decision_level {
            SatisfierSearch::SameDecisionLevels {
                satisfier_cause: satisfier_cause.expect(
                    "a satisfier at the same decision level as the previous one must be a derivation",
                ),
            }
        } else {
            SatisfierSearch::DifferentDecisionLevels {
                previous_satisfier_level,
            }
        };
        (satisfier_package, search_result)
    }

    fn find_satisfier<'i>(
        incompat: &'i Incompatibility<P, V, R>,
        package_assignments: &FxIndexMap<P, PackageAssignments<P, V, R>>,
    ) -> SatisfiedMap<'i, P, V, R> {
        let mut satisfied = SatisfiedMap::new();
        for (package, incompat_term) in incompat.iter() {
            let pa = package_assignments.get(package).expect("must exist");
            satisfied.insert(package, pa.satisfier(package, &incompat_term.inverse()));
        }
        satisfied
    }

    fn find_previous_satisfier<'i>(
        incompat: &Incompatibility<P, V, R>,
        satisfier_package: &'i P,
        mut satisfied_map: SatisfiedMap<'i, P, V, R>,
        package_assignments: &FxIndexMap<P, PackageAssignments<P, V, R>>,
        store: &Arena<Incompatibility<P, V, R>>,
    ) -> DecisionLevel {
        let satisfier_pa = package_assignments.get(satisfier_package).unwrap();
        let &(satisfier_cause, _, _) = satisfied_map.get(satisfier_package).unwrap();

        let accum_term = if let Some(cause) = satisfier_cause {
            store[cause].get(satisfier_package).unwrap().inverse()
        } else {
            match &satisfier_pa.assignments_intersection {
                AssignmentsIntersection::Derivations(_) => panic!("must be a decision"),
                AssignmentsIntersection::Decision { term, .. } => term.clone(),
            }
        };

        let incompat_term = incompat
            .get(satisfier_package)
            .expect("satisfier package not in incompat");

        let start_term = accum_term
            .intersect(&incompat_term.inverse())
            .unwrap_or_else(|| empty_term(satisfier_package.clone()));

        satisfied_map.insert(
            satisfier_package,
            satisfier_pa.satisfier(satisfier_package, &start_term),
        );

        let (_, &(_, _, decision_level)) = satisfied_map.latest();
        decision_level.max(DecisionLevel(1))
    }
}

impl<P: Package, V: Version, R: Revision> PackageAssignments<P, V, R> {
    /// The earliest point in this package's history at which the running
    /// intersection stopped overlapping `start_term`, i.e. became disjoint
    /// from it (so `start_term`'s negation was already established).
    fn satisfier(
        &self,
        package: &P,
        start_term: &Term<P, V, R>,
    ) -> (Option<IncompId<P, V, R>>, u32, DecisionLevel) {
        let idx = self
            .dated_derivations
            .as_slice()
            .partition_point(|dd| dd.accumulated_intersection.intersect(start_term).is_some());
        if let Some(dd) = self.dated_derivations.get(idx) {
            debug_assert!(dd.accumulated_intersection.intersect(start_term).is_none());
            return (Some(dd.cause), dd.global_index, dd.decision_level);
        }
        match &self.assignments_intersection {
            AssignmentsIntersection::Decision { global_index, .. } => {
                (None, *global_index, self.highest_decision_level)
            }
            AssignmentsIntersection::Derivations(accumulated_intersection) => {
                unreachable!(
                    "while processing package {package}: accumulated term {accumulated_intersection} \
                     overlaps with {start_term}, so the last assignment should have been a decision"
                )
            }
        }
    }
}
