// SPDX-License-Identifier: MPL-2.0

use std::sync::Arc;

use pubgrub::{
    solve, BoundVersion, DefaultStringReporter, InMemoryContainerProvider, PubGrubError,
    Reporter, Requirement, SemanticVersion,
};

fn v(major: u32, minor: u32, patch: u32) -> SemanticVersion {
    SemanticVersion::new(major, minor, patch)
}

/// A caret-style range `>= lo, < lo.major+1.0.0`, the shape every scenario in
/// this file needs.
fn caret(major: u32, minor: u32, patch: u32) -> Requirement<SemanticVersion, String> {
    Requirement::range(v(major, minor, patch), v(major + 1, 0, 0))
}

/// Trivial root: a root with no dependencies solves to just itself.
#[test]
fn trivial_root() {
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies("app", v(1, 0, 0), []);
    let solution = solve(Arc::new(provider), "app", v(1, 0, 0), []).unwrap();
    assert_eq!(solution, vec![("app", BoundVersion::Version(v(1, 0, 0)))]);
}

/// `app` depends on `b ^1.0.0`; `b` has three matching versions with no
/// dependencies of its own. The newest one, `1.2.0`, must be picked.
#[test]
fn linear_chain() {
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies("app", v(1, 0, 0), [("b", caret(1, 0, 0))]);
    provider.add_dependencies("b", v(1, 0, 0), []);
    provider.add_dependencies("b", v(1, 1, 0), []);
    provider.add_dependencies("b", v(1, 2, 0), []);

    let solution = solve(Arc::new(provider), "app", v(1, 0, 0), []).unwrap();
    let mut solution = solution.into_iter().collect::<std::collections::BTreeMap<_, _>>();
    assert_eq!(
        solution.remove("app"),
        Some(BoundVersion::Version(v(1, 0, 0)))
    );
    assert_eq!(
        solution.remove("b"),
        Some(BoundVersion::Version(v(1, 2, 0)))
    );
    assert!(solution.is_empty());
}

/// `app` needs `b ^1.0.0` and `c ^1.0.0`. `b@1.1.0` (the newest matching
/// version) needs `c ^2.0.0`, which conflicts with `app`'s own requirement on
/// `c`; the solver must backjump to `b@1.0.0`, which needs `c ^1.0.0`, and
/// settle on `c@1.0.0`.
#[test]
fn backjump_on_conflicting_transitive_dependency() {
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies(
        "app",
        v(1, 0, 0),
        [("b", caret(1, 0, 0)), ("c", caret(1, 0, 0))],
    );
    provider.add_dependencies("b", v(1, 1, 0), [("c", caret(2, 0, 0))]);
    provider.add_dependencies("b", v(1, 0, 0), [("c", caret(1, 0, 0))]);
    provider.add_dependencies("c", v(1, 0, 0), []);
    provider.add_dependencies("c", v(2, 0, 0), []);

    let solution = solve(Arc::new(provider), "app", v(1, 0, 0), []).unwrap();
    let mut solution = solution.into_iter().collect::<std::collections::BTreeMap<_, _>>();
    assert_eq!(
        solution.remove("b"),
        Some(BoundVersion::Version(v(1, 0, 0)))
    );
    assert_eq!(
        solution.remove("c"),
        Some(BoundVersion::Version(v(1, 0, 0)))
    );
}

/// `app` needs `b ^3.0.0`, but `b` only offers `1.0.0` and `2.0.0`: no
/// version in range exists, so solving fails and the explanation mentions the
/// missing range.
#[test]
fn no_matching_version_is_reported() {
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies("app", v(1, 0, 0), [("b", caret(3, 0, 0))]);
    provider.add_dependencies("b", v(1, 0, 0), []);
    provider.add_dependencies("b", v(2, 0, 0), []);

    let err = solve(Arc::new(provider), "app", v(1, 0, 0), []).unwrap_err();
    let PubGrubError::Unresolvable(tree) = err else {
        panic!("expected an unresolvable error, got {err:?}");
    };
    let report = DefaultStringReporter::report(&tree);
    assert!(
        report.contains("no available version of b"),
        "report was: {report}"
    );
}

/// `app` needs both `b ^1.0.0` and `b ^2.0.0` directly: these can never be
/// satisfied together, and the reporter's explanation must mention both of
/// the clashing requirements.
#[test]
fn direct_conflict_is_reported() {
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies(
        "app",
        v(1, 0, 0),
        [("b", caret(1, 0, 0)), ("b", caret(2, 0, 0))],
    );
    provider.add_dependencies("b", v(1, 0, 0), []);
    provider.add_dependencies("b", v(2, 0, 0), []);

    let err = solve(Arc::new(provider), "app", v(1, 0, 0), []).unwrap_err();
    let PubGrubError::Unresolvable(tree) = err else {
        panic!("expected an unresolvable error, got {err:?}");
    };
    let report = DefaultStringReporter::report(&tree);
    assert!(report.contains("depends on b"), "report was: {report}");
}

/// A diamond dependency (`app -> {x, y}`, `x -> z`, `y -> z`) must decide `z`
/// exactly once even though two packages depend on it.
#[test]
fn diamond_dependency() {
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies("app", v(1, 0, 0), [("x", caret(1, 0, 0)), ("y", caret(1, 0, 0))]);
    provider.add_dependencies("x", v(1, 0, 0), [("z", caret(1, 0, 0))]);
    provider.add_dependencies("y", v(1, 0, 0), [("z", caret(1, 0, 0))]);
    provider.add_dependencies("z", v(1, 0, 0), []);

    let solution = solve(Arc::new(provider), "app", v(1, 0, 0), []).unwrap();
    assert_eq!(solution.len(), 4);
    let mut solution = solution.into_iter().collect::<std::collections::BTreeMap<_, _>>();
    assert_eq!(
        solution.remove("z"),
        Some(BoundVersion::Version(v(1, 0, 0)))
    );
}

/// `app` accepts any version of `b`, but `b` is pinned to `1.0.0` even though
/// `2.0.0` is newer and would otherwise be picked first.
#[test]
fn pin_overrides_latest_first_decision() {
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies("app", v(1, 0, 0), [("b", Requirement::any())]);
    provider.add_dependencies("b", v(1, 0, 0), []);
    provider.add_dependencies("b", v(2, 0, 0), []);

    let pins = [("b", Requirement::exact(v(1, 0, 0)))];
    let solution = solve(Arc::new(provider), "app", v(1, 0, 0), pins).unwrap();
    let mut solution = solution.into_iter().collect::<std::collections::BTreeMap<_, _>>();
    assert_eq!(
        solution.remove("b"),
        Some(BoundVersion::Version(v(1, 0, 0)))
    );
}
