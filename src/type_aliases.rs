// SPDX-License-Identifier: MPL-2.0

//! Publicly exported type aliases.

use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

/// Map implementation used by the library, where iteration order does not matter.
pub(crate) type Map<K, V> = rustc_hash::FxHashMap<K, V>;

/// Set implementation used by the library, where iteration order does not matter.
pub(crate) type Set<V> = rustc_hash::FxHashSet<V>;

/// Hash builder used by the insertion-ordered maps that need a faster hasher
/// than the default `std` one ([IndexMap](indexmap::IndexMap), [PriorityQueue](priority_queue::PriorityQueue)).
pub(crate) type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Concrete resolution chosen by the library during [solve](crate::solver::solve):
/// one binding per package.
pub type SelectedDependencies<P, V, R> = Vec<(P, crate::solver::BoundVersion<V, R>)>;

/// What a package depends on: a list of `(package, requirement)` pairs.
pub type DependencyConstraints<P, V, R> = Map<P, crate::requirement::Requirement<V, R>>;
