// SPDX-License-Identifier: MPL-2.0

//! An incompatibility is a set of terms for different packages
//! that should never be satisfied all together.

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxHashSet as Set;

use crate::internal::arena::{Arena, Id};
use crate::package::Package;
use crate::report::{DefaultStringReporter, DerivationTree, Derived, External};
use crate::requirement::Requirement;
use crate::revision::Revision;
use crate::term::{self, Term};
use crate::version::Version;

pub(crate) type IncompId<P, V, R> = Id<Incompatibility<P, V, R>>;

/// An incompatibility is a set of terms for different packages
/// that should never be satisfied all together.
/// An incompatibility usually originates from a package dependency.
/// For example, if package A at version 1 depends on package B
/// at version 2, you can never have both terms `A = 1`
/// and `not B = 2` satisfied at the same time in a partial solution.
/// Yet A at version 1 depends on B at version 2 so this is not possible.
/// Therefore, the set `{ A = 1, not B = 2 }` is an incompatibility,
/// defined from dependencies of A at version 1.
///
/// Incompatibilities can also be derived from two other incompatibilities
/// during conflict resolution.
#[derive(Debug, Clone)]
pub(crate) struct Incompatibility<P: Package, V: Version, R: Revision> {
    package_terms: IndexMap<P, Term<P, V, R>>,
    cause: Cause<P, V, R>,
}

/// Why an incompatibility exists.
#[derive(Debug, Clone)]
pub(crate) enum Cause<P: Package, V: Version, R: Revision> {
    /// Initial incompatibility aiming at picking the root package for the first decision.
    Root,
    /// A pin forbids every target outside the pinned requirement.
    Pin(Requirement<V, R>),
    /// There are no versions matching the given requirement for this package.
    NoVersions(Requirement<V, R>),
    /// Incompatibility coming from the dependencies of a given package at a given version.
    Dependency(V),
    /// Derived from two causes during conflict resolution. Stores parent ids.
    Conflict(IncompId<P, V, R>, IncompId<P, V, R>),
}

/// A Relation describes how a set of terms can be compared to an incompatibility.
/// Typically, the set of terms comes from the partial solution.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Relation<P: Package> {
    /// We say that a set of terms S satisfies an incompatibility I
    /// if S satisfies every term in I.
    Satisfied,
    /// We say that S contradicts I if S contradicts at least one term in I.
    Contradicted(P),
    /// If S satisfies all but one of I's terms and is inconclusive for the
    /// remaining term, we say S "almost satisfies" I, calling the remaining
    /// term's package the "unsatisfied" one.
    AlmostSatisfied(P),
    /// Otherwise, the relation is inconclusive.
    Inconclusive,
}

impl<P: Package, V: Version, R: Revision> Incompatibility<P, V, R> {
    /// Create the initial "not Root" incompatibility.
    pub(crate) fn not_root(package: P, version: V) -> Self {
        let term = Term::negative(package.clone(), Requirement::exact(version));
        let mut package_terms = IndexMap::with_capacity(1);
        package_terms.insert(package, term);
        Self {
            package_terms,
            cause: Cause::Root,
        }
    }

    /// Create an incompatibility forbidding targets outside a pin.
    pub(crate) fn from_pin(package: P, requirement: Requirement<V, R>) -> Self {
        let term = Term::negative(package.clone(), requirement.clone());
        let mut package_terms = IndexMap::with_capacity(1);
        package_terms.insert(package, term);
        Self {
            package_terms,
            cause: Cause::Pin(requirement),
        }
    }

    /// Create an incompatibility to remember that a term has no matching version.
    pub(crate) fn no_versions(package: P, term: Term<P, V, R>) -> Self {
        debug_assert!(term.is_positive(), "no_versions term should be positive");
        let requirement = term.requirement().clone();
        let mut package_terms = IndexMap::with_capacity(1);
        package_terms.insert(package, term);
        Self {
            package_terms,
            cause: Cause::NoVersions(requirement),
        }
    }

    /// Generate a list of incompatibilities from the direct dependencies of a package version.
    pub(crate) fn from_dependencies(
        package: P,
        version: V,
        deps: impl IntoIterator<Item = (P, Requirement<V, R>)>,
    ) -> Vec<Self> {
        deps.into_iter()
            .map(|(dep_p, dep_req)| {
                Self::from_dependency(package.clone(), version.clone(), dep_p, dep_req)
            })
            .collect()
    }

    fn from_dependency(package: P, version: V, dep_p: P, dep_req: Requirement<V, R>) -> Self {
        let mut package_terms = IndexMap::with_capacity(2);
        package_terms.insert(
            package.clone(),
            Term::positive(package, Requirement::exact(version.clone())),
        );
        package_terms.insert(dep_p.clone(), Term::negative(dep_p, dep_req));
        Self {
            package_terms,
            cause: Cause::Dependency(version),
        }
    }

    /// Prior cause of two incompatibilities using the rule of resolution.
    pub(crate) fn prior_cause(
        self_id: IncompId<P, V, R>,
        satisfier_cause_id: IncompId<P, V, R>,
        incompat: &Self,
        satisfier_cause: &Self,
        package: &P,
    ) -> Self {
        let cause = Cause::Conflict(self_id, satisfier_cause_id);
        let mut package_terms = incompat.package_terms.clone();
        let t1 = package_terms.shift_remove(package).expect(
            "prior_cause package must be present in the incompatibility",
        );
        for (p, t2) in satisfier_cause.package_terms.iter() {
            if p == package {
                continue;
            }
            match package_terms.get(p) {
                Some(t1) => {
                    if let Some(intersection) = t1.intersect(t2) {
                        package_terms.insert(p.clone(), intersection);
                    } else {
                        package_terms.shift_remove(p);
                    }
                }
                None => {
                    package_terms.insert(p.clone(), t2.clone());
                }
            }
        }
        let t2 = satisfier_cause
            .package_terms
            .get(package)
            .expect("satisfier_cause must mention package");
        if let Some(union) = t1.union(t2) {
            // A tautological term (true of every target) carries no
            // information and must not be re-inserted: doing so would leave
            // a vacuous entry in the derived incompatibility that callers
            // (`find_satisfier`, `relation`) assume is a real constraint.
            let tautology = Term::positive(package.clone(), Requirement::any());
            if union != tautology {
                package_terms.insert(package.clone(), union);
            }
        }
        Self {
            package_terms,
            cause,
        }
    }

    /// Compare this incompatibility to a set of terms coming from the partial solution.
    pub(crate) fn relation(
        &self,
        mut terms: impl FnMut(&P) -> Option<Term<P, V, R>>,
    ) -> Relation<P> {
        let mut relation = Relation::Satisfied;
        for (package, incompat_term) in self.package_terms.iter() {
            match terms(package).map(|term| incompat_term.relation_with(&term)) {
                Some(term::Relation::Satisfied) => {}
                Some(term::Relation::Contradicted) => {
                    return Relation::Contradicted(package.clone());
                }
                None | Some(term::Relation::Inconclusive) => {
                    if relation == Relation::Satisfied {
                        relation = Relation::AlmostSatisfied(package.clone());
                    } else {
                        relation = Relation::Inconclusive;
                    }
                }
            }
        }
        relation
    }

    /// Check if an incompatibility is a complete failure: it satisfies the
    /// root package alone, ending the algorithm.
    pub(crate) fn is_terminal(&self, root_package: &P, root_version: &V) -> bool {
        match self.package_terms.len() {
            0 => true,
            1 => {
                let (package, term) = self.package_terms.iter().next().unwrap();
                package == root_package && term.is_satisfied_by(root_version)
            }
            _ => false,
        }
    }

    /// Get the term related to a given package, if it exists.
    pub(crate) fn get(&self, package: &P) -> Option<&Term<P, V, R>> {
        self.package_terms.get(package)
    }

    /// Iterate over packages.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&P, &Term<P, V, R>)> {
        self.package_terms.iter()
    }

    /// Retrieve parent causes, if derived from conflict resolution.
    pub(crate) fn causes(&self) -> Option<(IncompId<P, V, R>, IncompId<P, V, R>)> {
        match self.cause {
            Cause::Conflict(id1, id2) => Some((id1, id2)),
            _ => None,
        }
    }

    /// Build a derivation tree for error reporting.
    pub(crate) fn build_derivation_tree(
        &self,
        self_id: IncompId<P, V, R>,
        shared_ids: &Set<IncompId<P, V, R>>,
        store: &Arena<Self>,
        precomputed: &mut std::collections::HashMap<IncompId<P, V, R>, std::sync::Arc<DerivationTree<P, V, R>>>,
    ) -> std::sync::Arc<DerivationTree<P, V, R>> {
        if let Some(tree) = precomputed.get(&self_id) {
            return tree.clone();
        }
        let tree = match &self.cause {
            Cause::Conflict(id1, id2) => {
                let cause1 = store[*id1].build_derivation_tree(*id1, shared_ids, store, precomputed);
                let cause2 = store[*id2].build_derivation_tree(*id2, shared_ids, store, precomputed);
                DerivationTree::Derived(Derived {
                    terms: self.package_terms.iter().map(|(p, t)| (p.clone(), t.clone())).collect(),
                    shared_id: shared_ids.contains(&self_id).then_some(self_id.into_raw()),
                    cause1,
                    cause2,
                })
            }
            Cause::Root => {
                let (package, _) = self.package_terms.iter().next().unwrap();
                DerivationTree::External(External::NotRoot(package.clone()))
            }
            Cause::Pin(requirement) => {
                let (package, _) = self.package_terms.iter().next().unwrap();
                DerivationTree::External(External::Pinned(package.clone(), requirement.clone()))
            }
            Cause::NoVersions(requirement) => {
                let (package, _) = self.package_terms.iter().next().unwrap();
                DerivationTree::External(External::NoVersions(package.clone(), requirement.clone()))
            }
            Cause::Dependency(version) => {
                let mut it = self.package_terms.iter();
                let (package, _) = it.next().unwrap();
                let (dep_package, dep_term) = it.next().unwrap();
                DerivationTree::External(External::FromDependencyOf(
                    package.clone(),
                    version.clone(),
                    dep_package.clone(),
                    dep_term.requirement().clone(),
                ))
            }
        };
        let tree = std::sync::Arc::new(tree);
        precomputed.insert(self_id, tree.clone());
        tree
    }
}

impl<P: Package, V: Version, R: Revision> fmt::Display for Incompatibility<P, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            DefaultStringReporter::string_terms(&self.package_terms)
        )
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::internal::arena::Arena;
    use crate::term::tests::strategy as term_strat;
    use proptest::prelude::*;

    proptest! {
        /// For any three different packages p1, p2 and p3,
        /// for any three terms t1, t2 and t3,
        /// if we have the two following incompatibilities:
        ///    { p1: t1, p2: not t2 }
        ///    { p2: t2, p3: t3 }
        /// the rule of resolution says that we can deduce the following incompatibility:
        ///    { p1: t1, p3: t3 }
        #[test]
        fn rule_of_resolution(t1 in term_strat(), t2 in term_strat(), t3 in term_strat()) {
            let mut store: Arena<Incompatibility<&'static str, _, &'static str>> = Arena::new();

            let mut pt1 = IndexMap::new();
            pt1.insert("p1", t1.clone());
            pt1.insert("p2", t2.inverse());
            let i1 = Incompatibility { package_terms: pt1, cause: Cause::Root };
            let id1 = store.alloc(i1);

            let mut pt2 = IndexMap::new();
            pt2.insert("p2", t2.clone());
            pt2.insert("p3", t3.clone());
            let i2 = Incompatibility { package_terms: pt2, cause: Cause::Root };
            let id2 = store.alloc(i2);

            let mut expected = IndexMap::new();
            expected.insert("p1", t1);
            expected.insert("p3", t3);

            let resolution = Incompatibility::prior_cause(id1, id2, &store[id1], &store[id2], &"p2");
            prop_assert_eq!(resolution.package_terms, expected);
        }
    }

    /// When the rule of resolution unions a tautological term (e.g. derived
    /// from `no_versions` on an unconstrained dependency to a missing
    /// package) against any other term for the same package, the result must
    /// not leave a vacuous entry behind: it carries no information, and
    /// `find_satisfier`/`relation` both assume every entry does.
    #[test]
    fn prior_cause_drops_tautological_union() {
        use crate::version::NumberVersion;

        let mut store: Arena<Incompatibility<&'static str, NumberVersion, &'static str>> =
            Arena::new();

        let mut pt1 = IndexMap::new();
        pt1.insert(
            "p1",
            Term::positive("p1", Requirement::range(NumberVersion(0), NumberVersion(1))),
        );
        pt1.insert("shared", Term::positive("shared", Requirement::any()));
        let i1 = Incompatibility {
            package_terms: pt1,
            cause: Cause::NoVersions(Requirement::any()),
        };
        let id1 = store.alloc(i1);

        let mut pt2 = IndexMap::new();
        pt2.insert(
            "shared",
            Term::positive("shared", Requirement::range(NumberVersion(1), NumberVersion(5))),
        );
        pt2.insert(
            "p3",
            Term::positive("p3", Requirement::range(NumberVersion(0), NumberVersion(1))),
        );
        let i2 = Incompatibility { package_terms: pt2, cause: Cause::Root };
        let id2 = store.alloc(i2);

        let resolution =
            Incompatibility::prior_cause(id1, id2, &store[id1], &store[id2], &"shared");

        assert!(
            !resolution.package_terms.contains_key("shared"),
            "tautological union for 'shared' must not be reinserted: {:?}",
            resolution.package_terms
        );
        assert!(resolution.package_terms.contains_key("p1"));
        assert!(resolution.package_terms.contains_key("p3"));
    }
}
