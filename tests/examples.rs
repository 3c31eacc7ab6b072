// SPDX-License-Identifier: MPL-2.0

//! Scenarios adapted from the Dart pub solver's worked examples
//! (<https://github.com/dart-lang/pub/blob/master/doc/solver.md>), translated
//! onto this crate's container-provider API.

use std::io::Write;
use std::sync::Arc;

use log::LevelFilter;
use pubgrub::{solve, BoundVersion, InMemoryContainerProvider, Requirement, SemanticVersion};

fn init_log() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Trace)
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .is_test(true)
        .try_init();
}

fn v(major: u32, minor: u32, patch: u32) -> SemanticVersion {
    SemanticVersion::new(major, minor, patch)
}

fn between(lo: (u32, u32, u32), hi: (u32, u32, u32)) -> Requirement<SemanticVersion, String> {
    Requirement::range(v(lo.0, lo.1, lo.2), v(hi.0, hi.1, hi.2))
}

fn higher_than(lo: (u32, u32, u32)) -> Requirement<SemanticVersion, String> {
    Requirement::range(v(lo.0, lo.1, lo.2), v(u32::MAX, 0, 0))
}

fn expect(
    solution: Vec<(&'static str, BoundVersion<SemanticVersion, String>)>,
) -> std::collections::BTreeMap<&'static str, BoundVersion<SemanticVersion, String>> {
    solution.into_iter().collect()
}

/// <https://github.com/dart-lang/pub/blob/master/doc/solver.md#no-conflicts>
#[test]
fn no_conflict() {
    init_log();
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies("root", v(1, 0, 0), [("foo", between((1, 0, 0), (2, 0, 0)))]);
    provider.add_dependencies("foo", v(1, 0, 0), [("bar", between((1, 0, 0), (2, 0, 0)))]);
    provider.add_dependencies("bar", v(1, 0, 0), []);
    provider.add_dependencies("bar", v(2, 0, 0), []);

    let mut solution = expect(solve(Arc::new(provider), "root", v(1, 0, 0), []).unwrap());
    assert_eq!(solution.remove("root"), Some(BoundVersion::Version(v(1, 0, 0))));
    assert_eq!(solution.remove("foo"), Some(BoundVersion::Version(v(1, 0, 0))));
    assert_eq!(solution.remove("bar"), Some(BoundVersion::Version(v(1, 0, 0))));
    assert!(solution.is_empty());
}

/// <https://github.com/dart-lang/pub/blob/master/doc/solver.md#avoiding-conflict-during-decision-making>
#[test]
fn avoiding_conflict_during_decision_making() {
    init_log();
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies(
        "root",
        v(1, 0, 0),
        [
            ("foo", between((1, 0, 0), (2, 0, 0))),
            ("bar", between((1, 0, 0), (2, 0, 0))),
        ],
    );
    provider.add_dependencies("foo", v(1, 1, 0), [("bar", between((2, 0, 0), (3, 0, 0)))]);
    provider.add_dependencies("foo", v(1, 0, 0), []);
    provider.add_dependencies("bar", v(1, 0, 0), []);
    provider.add_dependencies("bar", v(1, 1, 0), []);
    provider.add_dependencies("bar", v(2, 0, 0), []);

    let mut solution = expect(solve(Arc::new(provider), "root", v(1, 0, 0), []).unwrap());
    assert_eq!(solution.remove("root"), Some(BoundVersion::Version(v(1, 0, 0))));
    assert_eq!(solution.remove("foo"), Some(BoundVersion::Version(v(1, 0, 0))));
    assert_eq!(solution.remove("bar"), Some(BoundVersion::Version(v(1, 1, 0))));
}

/// <https://github.com/dart-lang/pub/blob/master/doc/solver.md#performing-conflict-resolution>
#[test]
fn conflict_resolution() {
    init_log();
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies("root", v(1, 0, 0), [("foo", higher_than((1, 0, 0)))]);
    provider.add_dependencies("foo", v(2, 0, 0), [("bar", between((1, 0, 0), (2, 0, 0)))]);
    provider.add_dependencies("foo", v(1, 0, 0), []);
    provider.add_dependencies("bar", v(1, 0, 0), [("foo", between((1, 0, 0), (2, 0, 0)))]);

    let mut solution = expect(solve(Arc::new(provider), "root", v(1, 0, 0), []).unwrap());
    assert_eq!(solution.remove("root"), Some(BoundVersion::Version(v(1, 0, 0))));
    assert_eq!(solution.remove("foo"), Some(BoundVersion::Version(v(1, 0, 0))));
}

/// <https://github.com/dart-lang/pub/blob/master/doc/solver.md#conflict-resolution-with-a-partial-satisfier>
#[test]
fn conflict_with_partial_satisfier() {
    init_log();
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    // root 1.0.0 depends on foo ^1.0.0 and target ^2.0.0
    provider.add_dependencies(
        "root",
        v(1, 0, 0),
        [
            ("foo", between((1, 0, 0), (2, 0, 0))),
            ("target", between((2, 0, 0), (3, 0, 0))),
        ],
    );
    // foo 1.1.0 depends on left ^1.0.0 and right ^1.0.0
    provider.add_dependencies(
        "foo",
        v(1, 1, 0),
        [
            ("left", between((1, 0, 0), (2, 0, 0))),
            ("right", between((1, 0, 0), (2, 0, 0))),
        ],
    );
    provider.add_dependencies("foo", v(1, 0, 0), []);
    // left 1.0.0 depends on shared >=1.0.0
    provider.add_dependencies("left", v(1, 0, 0), [("shared", higher_than((1, 0, 0)))]);
    // right 1.0.0 depends on shared <2.0.0
    provider.add_dependencies("right", v(1, 0, 0), [("shared", between((0, 0, 0), (2, 0, 0)))]);
    provider.add_dependencies("shared", v(2, 0, 0), []);
    // shared 1.0.0 depends on target ^1.0.0
    provider.add_dependencies("shared", v(1, 0, 0), [("target", between((1, 0, 0), (2, 0, 0)))]);
    provider.add_dependencies("target", v(2, 0, 0), []);
    provider.add_dependencies("target", v(1, 0, 0), []);

    let mut solution = expect(solve(Arc::new(provider), "root", v(1, 0, 0), []).unwrap());
    assert_eq!(solution.remove("root"), Some(BoundVersion::Version(v(1, 0, 0))));
    assert_eq!(solution.remove("foo"), Some(BoundVersion::Version(v(1, 0, 0))));
    assert_eq!(solution.remove("target"), Some(BoundVersion::Version(v(2, 0, 0))));
}

/// a0 depends on b and c; b0 depends on d0; b1 depends on d1 (not existing);
/// c0 has no dependency; c1 depends on d2 (not existing); d0 has no
/// dependency. Solution: a0, b0, c0, d0.
#[test]
fn double_choices() {
    init_log();
    let mut provider = InMemoryContainerProvider::<&str, SemanticVersion, String>::new();
    provider.add_dependencies("a", v(0, 0, 0), [("b", Requirement::any()), ("c", Requirement::any())]);
    provider.add_dependencies("b", v(0, 0, 0), [("d", Requirement::exact(v(0, 0, 0)))]);
    provider.add_dependencies("b", v(1, 0, 0), [("d", Requirement::exact(v(1, 0, 0)))]);
    provider.add_dependencies("c", v(0, 0, 0), []);
    provider.add_dependencies("c", v(1, 0, 0), [("d", Requirement::exact(v(2, 0, 0)))]);
    provider.add_dependencies("d", v(0, 0, 0), []);

    let mut solution = expect(solve(Arc::new(provider), "a", v(0, 0, 0), []).unwrap());
    assert_eq!(solution.remove("a"), Some(BoundVersion::Version(v(0, 0, 0))));
    assert_eq!(solution.remove("b"), Some(BoundVersion::Version(v(0, 0, 0))));
    assert_eq!(solution.remove("c"), Some(BoundVersion::Version(v(0, 0, 0))));
    assert_eq!(solution.remove("d"), Some(BoundVersion::Version(v(0, 0, 0))));
}
