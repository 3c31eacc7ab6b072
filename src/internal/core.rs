// SPDX-License-Identifier: MPL-2.0

//! Core model and functions to run the pure, synchronous half of the PubGrub
//! algorithm: unit propagation and conflict resolution. Deciding which
//! package to fetch next, and actually fetching it, is the caller's job (see
//! [crate::solver]) since that requires talking to a container provider.

use std::sync::Arc;

use rustc_hash::FxHashMap as Map;
use rustc_hash::FxHashSet as Set;

use crate::internal::arena::{Arena, Id};
use crate::internal::incompatibility::{IncompId, Incompatibility, Relation};
use crate::internal::partial_solution::{DecisionLevel, PartialSolution, SatisfierSearch};
use crate::internal::small_vec::SmallVec;
use crate::package::Package;
use crate::report::DerivationTree;
use crate::requirement::Requirement;
use crate::revision::Revision;
use crate::term::Term;
use crate::version::Version;

/// Current state of the PubGrub algorithm.
#[derive(Clone)]
pub(crate) struct State<P: Package, V: Version, R: Revision> {
    root_package: P,
    root_version: V,

    incompatibilities: Map<P, Vec<IncompId<P, V, R>>>,

    /// Incompatibilities already known to be contradicted, with the decision
    /// level at which that was discovered. They stay contradicted until we
    /// backtrack past that level.
    contradicted_incompatibilities: Map<IncompId<P, V, R>, DecisionLevel>,

    pub(crate) partial_solution: PartialSolution<P, V, R>,

    /// Reference storage for every incompatibility ever created.
    pub(crate) incompatibility_store: Arena<Incompatibility<P, V, R>>,

    /// Work queue for `unit_propagation`, reused across calls to avoid
    /// reallocating on every invocation.
    unit_propagation_buffer: SmallVec<P>,
}

impl<P: Package, V: Version, R: Revision> State<P, V, R> {
    /// Initialize the state with the root package/version decided and any
    /// pins installed as incompatibilities, mirroring how the root decision
    /// itself is installed (a pin forbids every target outside its
    /// requirement, the same way `not_root` forbids every other root).
    pub(crate) fn init(
        root_package: P,
        root_version: V,
        pins: impl IntoIterator<Item = (P, Requirement<V, R>)>,
    ) -> Self {
        let mut incompatibility_store = Arena::new();
        let not_root_id = incompatibility_store.alloc(Incompatibility::not_root(
            root_package.clone(),
            root_version.clone(),
        ));
        let mut incompatibilities = Map::default();
        incompatibilities.insert(root_package.clone(), vec![not_root_id]);

        let mut state = Self {
            root_package,
            root_version,
            incompatibilities,
            contradicted_incompatibilities: Map::default(),
            partial_solution: PartialSolution::empty(),
            incompatibility_store,
            unit_propagation_buffer: SmallVec::empty(),
        };
        for (package, requirement) in pins {
            state.add_incompatibility(Incompatibility::from_pin(package, requirement));
        }
        state
    }

    pub(crate) fn root_package(&self) -> &P {
        &self.root_package
    }

    pub(crate) fn root_version(&self) -> &V {
        &self.root_version
    }

    /// Force the root package's decision ahead of the normal propagate/decide
    /// loop, registering `deps` as its dependencies. Used by
    /// [crate::solver::solve_from_constraints], where the root is synthetic
    /// and has no container to fetch: its "dependencies" are simply the
    /// constraints the caller supplied.
    pub(crate) fn force_root_decision(
        &mut self,
        deps: impl IntoIterator<Item = (P, Requirement<V, R>)>,
    ) {
        let not_root_id = self.incompatibilities[&self.root_package][0];
        self.partial_solution
            .derive(self.root_package.clone(), not_root_id, &self.incompatibility_store);
        self.add_incompatibility_from_dependencies(
            self.root_package.clone(),
            self.root_version.clone(),
            deps,
        );
        self.partial_solution.decide(
            self.root_package.clone(),
            Term::positive(self.root_package.clone(), Requirement::exact(self.root_version.clone())),
        );
    }

    /// Add an incompatibility to the state.
    pub(crate) fn add_incompatibility(&mut self, incompat: Incompatibility<P, V, R>) {
        let id = self.incompatibility_store.alloc(incompat);
        self.register(id);
    }

    /// Add the incompatibilities coming from the dependencies of a package at
    /// a given version, returning the range of ids just allocated.
    pub(crate) fn add_incompatibility_from_dependencies(
        &mut self,
        package: P,
        version: V,
        deps: impl IntoIterator<Item = (P, Requirement<V, R>)>,
    ) -> std::ops::Range<IncompId<P, V, R>> {
        let new_incompats_id_range = self
            .incompatibility_store
            .alloc_iter(Incompatibility::from_dependencies(package, version, deps).into_iter());
        for id in Id::range_to_iter(new_incompats_id_range.clone()) {
            self.register(id);
        }
        new_incompats_id_range
    }

    fn register(&mut self, id: IncompId<P, V, R>) {
        for (package, _) in self.incompatibility_store[id].iter() {
            self.incompatibilities
                .entry(package.clone())
                .or_default()
                .push(id);
        }
    }

    /// Unit propagation is the core mechanism of the solving algorithm: it
    /// re-checks every incompatibility mentioning a changed package, deriving
    /// new assignments until either nothing changes anymore, or a conflict is
    /// found and resolved (possibly backtracking).
    pub(crate) fn unit_propagation(
        &mut self,
        package: P,
    ) -> Result<(), IncompId<P, V, R>> {
        self.unit_propagation_buffer.clear();
        self.unit_propagation_buffer.push(package);
        while let Some(current_package) = self.unit_propagation_buffer.pop() {
            let mut conflict_id = None;
            // Iterate in reverse order, so the newest incompatibilities (most
            // likely to be relevant) are checked first.
            for &incompat_id in self.incompatibilities[&current_package].iter().rev() {
                if self.contradicted_incompatibilities.contains_key(&incompat_id) {
                    continue;
                }
                let current_incompat = &self.incompatibility_store[incompat_id];
                match self.partial_solution.relation(current_incompat) {
                    Relation::Satisfied => {
                        log::debug!(
                            "starting conflict resolution because incompatibility is satisfied: {current_incompat}"
                        );
                        conflict_id = Some(incompat_id);
                        break;
                    }
                    Relation::AlmostSatisfied(package_almost) => {
                        if !self.unit_propagation_buffer.as_slice().contains(&package_almost) {
                            self.unit_propagation_buffer.push(package_almost.clone());
                        }
                        self.partial_solution.derive(
                            package_almost,
                            incompat_id,
                            &self.incompatibility_store,
                        );
                        self.contradicted_incompatibilities
                            .insert(incompat_id, self.partial_solution.current_decision_level());
                    }
                    Relation::Contradicted(_) => {
                        self.contradicted_incompatibilities
                            .insert(incompat_id, self.partial_solution.current_decision_level());
                    }
                    Relation::Inconclusive => {}
                }
            }
            if let Some(incompat_id) = conflict_id {
                let (package_almost, root_cause) = self
                    .conflict_resolution(incompat_id)
                    .map_err(|terminal_incompat_id| terminal_incompat_id)?;
                self.unit_propagation_buffer.clear();
                self.unit_propagation_buffer.push(package_almost.clone());
                self.partial_solution.derive(
                    package_almost,
                    root_cause,
                    &self.incompatibility_store,
                );
                self.contradicted_incompatibilities
                    .insert(root_cause, self.partial_solution.current_decision_level());
            }
        }
        Ok(())
    }

    /// Resolve a conflict by repeatedly applying the rule of resolution,
    /// backtracking as soon as the new satisfier's decision level diverges
    /// from the previous one. Returns the root cause incompatibility and the
    /// package that must be re-derived from it, or the terminal
    /// incompatibility (the algorithm has failed) as an error.
    fn conflict_resolution(
        &mut self,
        incompatibility: IncompId<P, V, R>,
    ) -> Result<(P, IncompId<P, V, R>), IncompId<P, V, R>> {
        let mut current_incompat_id = incompatibility;
        loop {
            if self.incompatibility_store[current_incompat_id]
                .is_terminal(&self.root_package, &self.root_version)
            {
                return Err(current_incompat_id);
            }
            let (package, satisfier_search_result) = self.partial_solution.satisfier_search(
                &self.incompatibility_store[current_incompat_id],
                &self.incompatibility_store,
            );
            match satisfier_search_result {
                SatisfierSearch::DifferentDecisionLevels {
                    previous_satisfier_level,
                } => {
                    let package = package.clone();
                    self.backtrack(previous_satisfier_level);
                    log::info!("backtracking to decision level {previous_satisfier_level:?}");
                    return Ok((package, current_incompat_id));
                }
                SatisfierSearch::SameDecisionLevels { satisfier_cause } => {
                    let prior_cause = Incompatibility::prior_cause(
                        current_incompat_id,
                        satisfier_cause,
                        &self.incompatibility_store[current_incompat_id],
                        &self.incompatibility_store[satisfier_cause],
                        package,
                    );
                    log::debug!("prior cause: {prior_cause}");
                    current_incompat_id = self.incompatibility_store.alloc(prior_cause);
                    self.register(current_incompat_id);
                }
            }
        }
    }

    fn backtrack(&mut self, decision_level: DecisionLevel) {
        self.partial_solution.backtrack(decision_level);
        self.contradicted_incompatibilities
            .retain(|_, dl| *dl <= decision_level);
    }

    /// Build an error-reporting tree from the terminal incompatibility
    /// returned by a failed `unit_propagation`.
    pub(crate) fn build_derivation_tree(
        &self,
        incompat: IncompId<P, V, R>,
    ) -> DerivationTree<P, V, R> {
        let mut all_ids: Set<IncompId<P, V, R>> = Set::default();
        let mut shared_ids = Set::default();
        let mut stack = vec![incompat];
        while let Some(i) = stack.pop() {
            if let Some((id1, id2)) = self.incompatibility_store[i].causes() {
                if all_ids.contains(&i) {
                    shared_ids.insert(i);
                } else {
                    stack.push(id1);
                    stack.push(id2);
                }
            }
            all_ids.insert(i);
        }
        // Processing in id order guarantees a cause is built before whatever
        // derives from it, since conflict resolution only ever allocates new
        // ids with a strictly higher raw value than their parents.
        let mut sorted_ids: Vec<_> = all_ids.into_iter().collect();
        sorted_ids.sort_unstable_by_key(|id| id.into_raw());
        let mut precomputed = std::collections::HashMap::new();
        for id in sorted_ids {
            self.incompatibility_store[id].build_derivation_tree(
                id,
                &shared_ids,
                &self.incompatibility_store,
                &mut precomputed,
            );
        }
        Arc::into_inner(precomputed.remove(&incompat).unwrap())
            .expect("the terminal incompatibility's tree must not be shared elsewhere")
    }
}
