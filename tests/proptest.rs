// SPDX-License-Identifier: MPL-2.0

//! Randomised registries fed through [solve], checked for two properties that
//! do not require knowing the "right" answer ahead of time: determinism
//! (solving the same registry twice gives the same result) and soundness (any
//! returned solution actually satisfies every constraint declared by the
//! packages it selected).

use std::collections::BTreeMap;
use std::sync::Arc;

use pubgrub::{solve, BoundVersion, InMemoryContainerProvider, NumberVersion, Requirement};

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use proptest::sample::Index;
use proptest::string::string_regex;

type Dep = (String, Requirement<NumberVersion, String>);

/// The name of a package this crate's registries never register a version
/// for: [build_provider] still declares it known (with no versions) via
/// [InMemoryContainerProvider::declare_empty], so a dependency edge pointing
/// at it always resolves to a real "no versions" incompatibility, including
/// for an otherwise-unconstrained requirement.
const MISSING: &str = "missing";

/// A random registry: package name -> (version -> dependencies).
/// Dependency edges only ever point from a package at a given index to one at
/// a strictly smaller index, which guarantees the registry graph is acyclic.
/// A fraction of edges are left unconstrained ([Requirement::any]) rather
/// than a range, and a fraction point at [MISSING] instead of a real
/// package, so the generated registries also exercise the "no versions for
/// an unconstrained dependency" corner.
fn registry_strategy(
    max_crates: usize,
    max_versions: usize,
) -> impl Strategy<Value = Vec<(String, NumberVersion, Vec<Dep>)>> {
    let name = string_regex("[a-z][a-z0-9]{0,5}")
        .unwrap()
        .prop_filter("reserved names", |n| n != "root" && n != MISSING);

    let list_of_versions = btree_map(0usize..max_versions, Just(()), 1..=max_versions)
        .prop_map(|m| m.into_keys().map(NumberVersion).collect::<Vec<_>>());

    let crates_with_versions = btree_map(name, list_of_versions, 1..=max_crates);

    let raw_dependency = (
        any::<Index>(),
        any::<Index>(),
        any::<Index>(),
        any::<Index>(),
        // Roughly one edge in eight is unconstrained, and one in eight
        // dangles onto `MISSING`; the two are independent, so some edges are
        // both.
        0u8..8,
        0u8..8,
    );
    let max_deps = max_crates * max_versions;
    let raw_dependencies = vec(raw_dependency, ..=max_deps);

    (crates_with_versions, raw_dependencies).prop_map(
        move |(crate_versions_by_name, raw_dependencies)| {
            let names: Vec<&String> = crate_versions_by_name.keys().collect();
            let pkgids: Vec<(String, NumberVersion)> = crate_versions_by_name
                .iter()
                .flat_map(|(name, vers)| vers.iter().map(move |v| (name.clone(), *v)))
                .collect();
            let mut deps_by_pkgid: Vec<Vec<Dep>> = vec![Vec::new(); pkgids.len()];

            for (a_idx, b_idx, lo_idx, hi_idx, unconstrained_roll, dangling_roll) in
                raw_dependencies
            {
                if names.len() < 2 {
                    continue;
                }
                let a = a_idx.index(names.len());
                let b = b_idx.index(names.len());
                if a == b {
                    continue;
                }
                // A package may only depend on an earlier (alphabetically
                // smaller) one, so the registry graph has no cycles.
                let (from_name_idx, dep_name_idx) = (a.max(b), a.min(b));
                let from_name = names[from_name_idx];
                let from_versions = &crate_versions_by_name[from_name];
                let from_pkgid_idx = pkgids
                    .iter()
                    .position(|(n, v)| n == from_name && v == &from_versions[0])
                    .unwrap();

                let unconstrained = unconstrained_roll == 0;
                let dangling = dangling_roll == 0;

                let dep_name = if dangling {
                    MISSING.to_string()
                } else {
                    names[dep_name_idx].clone()
                };
                let dep_req = if unconstrained || dangling {
                    // A dangling edge has no real versions to range over
                    // either way, so it is always left unconstrained too.
                    Requirement::any()
                } else {
                    let dep_versions = &crate_versions_by_name[&dep_name];
                    let lo = dep_versions[lo_idx.index(dep_versions.len())];
                    let hi = dep_versions[hi_idx.index(dep_versions.len())];
                    let (lo, hi) = (lo.min(hi), NumberVersion(lo.max(hi).0 + 1));
                    Requirement::range(lo, hi)
                };
                deps_by_pkgid[from_pkgid_idx].push((dep_name, dep_req));
            }

            pkgids
                .into_iter()
                .zip(deps_by_pkgid)
                .map(|((name, ver), deps)| (name, ver, deps))
                .collect()
        },
    )
}

fn build_provider(
    registry: &[(String, NumberVersion, Vec<Dep>)],
) -> InMemoryContainerProvider<String, NumberVersion, String> {
    let mut provider = InMemoryContainerProvider::new();
    provider.declare_empty(MISSING.to_string());
    for (name, ver, deps) in registry {
        provider.add_dependencies(name.clone(), *ver, deps.clone());
    }
    provider
}

/// The solution is sound iff, for every selected package, each dependency
/// declared by the version that was actually chosen is satisfied by the
/// chosen version of that dependency.
fn check_solution_is_sound(
    registry: &[(String, NumberVersion, Vec<Dep>)],
    solution: &BTreeMap<String, BoundVersion<NumberVersion, String>>,
) {
    for (name, ver, deps) in registry {
        let Some(BoundVersion::Version(chosen)) = solution.get(name) else {
            continue;
        };
        if chosen != ver {
            continue;
        }
        for (dep_name, dep_req) in deps {
            let Requirement::VersionSet(vs) = dep_req else {
                continue;
            };
            match solution.get(dep_name) {
                Some(BoundVersion::Version(dep_ver)) => {
                    assert!(
                        vs.contains(dep_ver),
                        "{name} {ver} depends on {dep_name} {vs} but {dep_ver} was selected"
                    );
                }
                other => {
                    panic!("{name} {ver} depends on {dep_name} {vs}, but it resolved to {other:?}")
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn solving_is_deterministic(registry in registry_strategy(8, 4)) {
        let provider = Arc::new(build_provider(&registry));
        let root = registry.first().map(|(n, _, _)| n.clone()).unwrap_or_else(|| "root".to_string());
        let root_version = registry.first().map(|(_, v, _)| *v).unwrap_or(NumberVersion(0));

        let first = solve(Arc::clone(&provider), root.clone(), root_version, []);
        for _ in 0..3 {
            let again = solve(Arc::clone(&provider), root.clone(), root_version, []);
            prop_assert_eq!(first.is_ok(), again.is_ok());
            if let (Ok(a), Ok(b)) = (&first, &again) {
                let a: BTreeMap<_, _> = a.iter().cloned().collect();
                let b: BTreeMap<_, _> = b.iter().cloned().collect();
                prop_assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn successful_solutions_satisfy_every_constraint(registry in registry_strategy(8, 4)) {
        let provider = Arc::new(build_provider(&registry));
        let root = registry.first().map(|(n, _, _)| n.clone()).unwrap_or_else(|| "root".to_string());
        let root_version = registry.first().map(|(_, v, _)| *v).unwrap_or(NumberVersion(0));

        if let Ok(solution) = solve(provider, root, root_version, []) {
            let solution: BTreeMap<_, _> = solution.into_iter().collect();
            check_solution_is_sound(&registry, &solution);
        }
    }
}
