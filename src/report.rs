// SPDX-License-Identifier: MPL-2.0

//! Build a human-readable report of why dependency solving failed.

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxHashMap as Map;

use crate::package::Package;
use crate::requirement::Requirement;
use crate::revision::Revision;
use crate::term::Term;
use crate::version::Version;

/// Derivation tree for an incompatibility, used for human-readable reporting.
#[derive(Debug, Clone)]
pub enum DerivationTree<P: Package, V: Version, R: Revision> {
    /// External incompatibility, whose cause is independent of this algorithm.
    External(External<P, V, R>),
    /// Incompatibility derived from two others during conflict resolution.
    Derived(Derived<P, V, R>),
}

/// Incompatibilities that are not derived from others, and thus contain
/// information specific to the reason they were added.
#[derive(Debug, Clone)]
pub enum External<P: Package, V: Version, R: Revision> {
    /// Initial incompatibility aiming at picking the root package for the first decision.
    NotRoot(P),
    /// A pin forbids every target outside the pinned requirement.
    Pinned(P, Requirement<V, R>),
    /// There are no versions matching the given requirement for this package.
    NoVersions(P, Requirement<V, R>),
    /// Incompatibility coming from the dependencies of a package at a given version.
    FromDependencyOf(P, V, P, Requirement<V, R>),
}

/// Incompatibility derived from two others during conflict resolution.
#[derive(Debug, Clone)]
pub struct Derived<P: Package, V: Version, R: Revision> {
    /// Terms of the incompatibility.
    pub terms: IndexMap<P, Term<P, V, R>>,
    /// Indicate if this incompatibility is present multiple times in the
    /// derivation tree, in which case it has been given a line number.
    pub shared_id: Option<usize>,
    /// First cause.
    pub cause1: std::sync::Arc<DerivationTree<P, V, R>>,
    /// Second cause.
    pub cause2: std::sync::Arc<DerivationTree<P, V, R>>,
}

impl<P: Package, V: Version, R: Revision> DerivationTree<P, V, R> {
    /// Get all packages referred to in the derivation tree.
    pub fn packages(&self) -> Vec<&P> {
        match self {
            Self::External(External::NotRoot(p)) => vec![p],
            Self::External(External::Pinned(p, _)) => vec![p],
            Self::External(External::NoVersions(p, _)) => vec![p],
            Self::External(External::FromDependencyOf(p, _, p2, _)) => vec![p, p2],
            Self::Derived(derived) => {
                let mut packages: Vec<&P> = derived.terms.keys().collect();
                packages.extend(derived.cause1.packages());
                packages.extend(derived.cause2.packages());
                packages
            }
        }
    }
}

impl<P: Package, V: Version, R: Revision> fmt::Display for External<P, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRoot(package) => {
                write!(f, "we are solving dependencies of {package}")
            }
            Self::Pinned(package, requirement) => {
                write!(f, "{package} is pinned to {requirement}")
            }
            Self::NoVersions(package, requirement) => {
                write!(f, "there is no available version of {package} in {requirement}")
            }
            Self::FromDependencyOf(package, version, dep_package, dep_requirement) => {
                write!(
                    f,
                    "{package} {version} depends on {dep_package} {dep_requirement}"
                )
            }
        }
    }
}

/// Trait for building a report from a derivation tree.
pub trait Reporter<P: Package, V: Version, R: Revision> {
    /// Type of the report.
    type Output;

    /// Generate a report from the derivation tree.
    fn report(derivation_tree: &DerivationTree<P, V, R>) -> Self::Output;

    /// Generate a report, applying the given formatter.
    fn report_with_formatter(
        derivation_tree: &DerivationTree<P, V, R>,
        formatter: &impl ReportFormatter<P, V, R, Output = Self::Output>,
    ) -> Self::Output;
}

/// Trait for formatting lines of the report.
pub trait ReportFormatter<P: Package, V: Version, R: Revision> {
    /// Type of the output.
    type Output;

    /// Format an external incompatibility.
    fn format_external(&self, external: &External<P, V, R>) -> Self::Output;

    /// Format the terms of an incompatibility.
    fn format_terms(&self, terms: &IndexMap<P, Term<P, V, R>>) -> String;

    /// Both causes are external, explain both.
    fn explain_both_external(
        &self,
        external1: &External<P, V, R>,
        external2: &External<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> Self::Output;

    /// Both causes are already-numbered derived incompatibilities.
    fn explain_both_ref(
        &self,
        ref_id1: usize,
        derived1: &Derived<P, V, R>,
        ref_id2: usize,
        derived2: &Derived<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> Self::Output;

    /// One derived cause is already referenced, the other is external.
    fn explain_ref_and_external(
        &self,
        ref_id: usize,
        derived: &Derived<P, V, R>,
        external: &External<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> Self::Output;

    /// Add an explanation for a prior external cause and the current external cause.
    fn and_explain_prior_and_external(
        &self,
        prior_external: &External<P, V, R>,
        external: &External<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> Self::Output;

    /// Add an explanation for a referenced cause.
    fn and_explain_ref(
        &self,
        ref_id: usize,
        derived: &Derived<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> Self::Output;

    /// Add an explanation for an external cause.
    fn and_explain_external(
        &self,
        external: &External<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> Self::Output;
}

/// Simple report formatter producing English prose.
pub struct DefaultStringReportFormatter;

impl<P: Package, V: Version, R: Revision> ReportFormatter<P, V, R> for DefaultStringReportFormatter {
    type Output = String;

    fn format_external(&self, external: &External<P, V, R>) -> String {
        format!("{external}")
    }

    fn format_terms(&self, terms: &IndexMap<P, Term<P, V, R>>) -> String {
        let terms: Vec<_> = terms.iter().collect();
        match terms.as_slice() {
            [] => "version solving failed".into(),
            [(package, term)] => format!("{package} {term}"),
            [(p1, t1), (p2, t2)] => format!("{p1} {t1} and {p2} {t2}"),
            slice => {
                let str_terms: Vec<String> =
                    slice.iter().map(|(p, t)| format!("{p} {t}")).collect();
                str_terms.join(", ")
            }
        }
    }

    fn explain_both_external(
        &self,
        external1: &External<P, V, R>,
        external2: &External<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> String {
        format!(
            "Because {} and {}, {}.",
            external1,
            external2,
            self.format_terms(current_terms)
        )
    }

    fn explain_both_ref(
        &self,
        ref_id1: usize,
        _derived1: &Derived<P, V, R>,
        ref_id2: usize,
        _derived2: &Derived<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> String {
        format!(
            "Because of the previous incompatibilities ({ref_id1}) and ({ref_id2}), {}.",
            self.format_terms(current_terms)
        )
    }

    fn explain_ref_and_external(
        &self,
        ref_id: usize,
        _derived: &Derived<P, V, R>,
        external: &External<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> String {
        format!(
            "Because of the previous incompatibility ({ref_id}) and because {external}, {}.",
            self.format_terms(current_terms)
        )
    }

    fn and_explain_prior_and_external(
        &self,
        prior_external: &External<P, V, R>,
        external: &External<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> String {
        format!(
            "And because {prior_external} and {external}, {}.",
            self.format_terms(current_terms)
        )
    }

    fn and_explain_ref(
        &self,
        ref_id: usize,
        _derived: &Derived<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> String {
        format!(
            "And because of the previous incompatibility ({ref_id}), {}.",
            self.format_terms(current_terms)
        )
    }

    fn and_explain_external(
        &self,
        external: &External<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
    ) -> String {
        format!("And because {external}, {}.", self.format_terms(current_terms))
    }
}

/// Default string reporter, producing a `String` from a derivation tree.
pub struct DefaultStringReporter {
    lines: Vec<String>,
    /// Number of times an incompatibility id has been referenced so far.
    ref_count: usize,
    /// Map from shared ids to assigned reference numbers.
    shared_with_ref: Map<usize, usize>,
}

impl DefaultStringReporter {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            ref_count: 0,
            shared_with_ref: Map::default(),
        }
    }

    /// Render the terms of an incompatibility, used by `Incompatibility`'s `Display` impl.
    pub(crate) fn string_terms<P: Package, V: Version, R: Revision>(
        terms: &IndexMap<P, Term<P, V, R>>,
    ) -> String {
        DefaultStringReportFormatter.format_terms(terms)
    }

    fn add_line_ref(&mut self) -> usize {
        self.ref_count += 1;
        self.ref_count
    }

    fn line_ref_of(&self, shared_id: Option<usize>) -> Option<usize> {
        shared_id.and_then(|id| self.shared_with_ref.get(&id).copied())
    }

    fn build_recursive<P: Package, V: Version, R: Revision>(
        &mut self,
        derived: &Derived<P, V, R>,
        formatter: &impl ReportFormatter<P, V, R, Output = String>,
    ) {
        self.build_recursive_helper(derived, formatter);
        if let Some(id) = derived.shared_id {
            if !self.shared_with_ref.contains_key(&id) {
                let ref_id = self.add_line_ref();
                self.shared_with_ref.insert(id, ref_id);
                if let Some(last) = self.lines.last_mut() {
                    last.push_str(&format!(" ({ref_id})"));
                }
            }
        }
    }

    fn build_recursive_helper<P: Package, V: Version, R: Revision>(
        &mut self,
        derived: &Derived<P, V, R>,
        formatter: &impl ReportFormatter<P, V, R, Output = String>,
    ) {
        match (derived.cause1.as_ref(), derived.cause2.as_ref()) {
            (DerivationTree::Derived(d1), DerivationTree::Derived(d2)) => {
                let ref1 = self.line_ref_of(d1.shared_id);
                let ref2 = self.line_ref_of(d2.shared_id);
                match (ref1, ref2) {
                    (Some(r1), Some(r2)) => {
                        let line = formatter.explain_both_ref(r1, d1, r2, d2, &derived.terms);
                        self.lines.push(line);
                    }
                    (Some(r1), None) => {
                        self.build_recursive(d2, formatter);
                        let line = formatter.and_explain_ref(r1, d1, &derived.terms);
                        self.lines.push(line);
                    }
                    (None, Some(r2)) => {
                        self.build_recursive(d1, formatter);
                        let line = formatter.and_explain_ref(r2, d2, &derived.terms);
                        self.lines.push(line);
                    }
                    (None, None) => {
                        self.build_recursive(d1, formatter);
                        self.build_recursive(d2, formatter);
                        let line = format!("Thus, {}.", formatter.format_terms(&derived.terms));
                        self.lines.push(line);
                    }
                }
            }
            (DerivationTree::Derived(d1), DerivationTree::External(e2)) => {
                self.report_one_each(d1, e2, &derived.terms, formatter);
            }
            (DerivationTree::External(e1), DerivationTree::Derived(d2)) => {
                self.report_one_each(d2, e1, &derived.terms, formatter);
            }
            (DerivationTree::External(e1), DerivationTree::External(e2)) => {
                let line = formatter.explain_both_external(e1, e2, &derived.terms);
                self.lines.push(line);
            }
        }
    }

    fn report_one_each<P: Package, V: Version, R: Revision>(
        &mut self,
        derived: &Derived<P, V, R>,
        external: &External<P, V, R>,
        current_terms: &IndexMap<P, Term<P, V, R>>,
        formatter: &impl ReportFormatter<P, V, R, Output = String>,
    ) {
        if let Some(ref_id) = self.line_ref_of(derived.shared_id) {
            let line =
                formatter.explain_ref_and_external(ref_id, derived, external, current_terms);
            self.lines.push(line);
        } else {
            self.build_recursive(derived, formatter);
            let line = formatter.and_explain_external(external, current_terms);
            self.lines.push(line);
        }
    }
}

impl<P: Package, V: Version, R: Revision> Reporter<P, V, R> for DefaultStringReporter {
    type Output = String;

    fn report(derivation_tree: &DerivationTree<P, V, R>) -> String {
        Self::report_with_formatter(derivation_tree, &DefaultStringReportFormatter)
    }

    fn report_with_formatter(
        derivation_tree: &DerivationTree<P, V, R>,
        formatter: &impl ReportFormatter<P, V, R, Output = String>,
    ) -> String {
        match derivation_tree {
            DerivationTree::External(external) => formatter.format_external(external),
            DerivationTree::Derived(derived) => {
                let mut reporter = Self::new();
                reporter.build_recursive(derived, formatter);
                reporter.lines.join("\n")
            }
        }
    }
}
