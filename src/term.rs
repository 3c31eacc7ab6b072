// SPDX-License-Identifier: MPL-2.0

//! A term is the fundamental unit of operation of the PubGrub algorithm.
//! It is a positive or negative expression regarding a single package's
//! chosen target: a [requirement](Requirement) about its version, revision,
//! or unversioned status.

use std::fmt;

use crate::package::Package;
use crate::requirement::Requirement;
use crate::revision::Revision;
use crate::version::Version;
use crate::version_set::VersionSet;

/// A predicate on a single package's chosen target, with polarity.
///
/// A positive term asserts "the chosen target of `package` lies in
/// `requirement`"; a negative term asserts the opposite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term<P, V, R> {
    package: P,
    requirement: Requirement<V, R>,
    positive: bool,
}

/// Relation of a term to the running intersection of a set of other terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relation {
    /// `t` must be true whenever every term in `S` is true.
    Satisfied,
    /// `t` must be false whenever every term in `S` is true.
    Contradicted,
    /// Neither of the above.
    Inconclusive,
}

impl<P: Package, V: Version, R: Revision> Term<P, V, R> {
    /// Construct a positive term.
    pub fn positive(package: P, requirement: Requirement<V, R>) -> Self {
        Self {
            package,
            requirement,
            positive: true,
        }
    }

    /// Construct a negative term.
    pub fn negative(package: P, requirement: Requirement<V, R>) -> Self {
        Self {
            package,
            requirement,
            positive: false,
        }
    }

    /// A term that is never true for `package`: `Negative(any)`.
    pub(crate) fn unconstrained(package: P) -> Self {
        Self::negative(package, Requirement::any())
    }

    /// The package this term is about.
    pub fn package(&self) -> &P {
        &self.package
    }

    /// The requirement this term asserts (or denies).
    pub fn requirement(&self) -> &Requirement<V, R> {
        &self.requirement
    }

    /// Whether this term is positive.
    pub fn is_positive(&self) -> bool {
        self.positive
    }

    /// Flip polarity only; the requirement is untouched.
    pub fn inverse(&self) -> Self {
        Self {
            package: self.package.clone(),
            requirement: self.requirement.clone(),
            positive: !self.positive,
        }
    }

    /// For positive version-set terms only: whether the given version would
    /// make this term true. Always false for revision/unversioned terms.
    pub fn is_satisfied_by(&self, version: &V) -> bool {
        match &self.requirement {
            Requirement::VersionSet(vs) => self.positive && vs.contains(version),
            Requirement::Revision(_) | Requirement::Unversioned => false,
        }
    }

    /// True when `self` being true forces `other` to be true.
    ///
    /// Returns false if the two terms refer to different packages. See §4.1
    /// for the full decision table.
    pub fn satisfies(&self, other: &Self) -> bool {
        if self.package != other.package {
            return false;
        }
        let same = self.positive == other.positive;
        match (&self.requirement, &other.requirement) {
            (Requirement::VersionSet(s), Requirement::VersionSet(o)) => {
                Self::version_sets_satisfy(s, o, same)
            }
            (Requirement::Revision(a), Requirement::Revision(b)) => a == b,
            (Requirement::Unversioned, Requirement::Unversioned) => true,
            _ => false,
        }
    }

    fn version_sets_satisfy(s: &VersionSet<V>, o: &VersionSet<V>, same: bool) -> bool {
        match (s, o) {
            (VersionSet::Empty, _) | (_, VersionSet::Empty) => !same,
            (VersionSet::Any, _) | (_, VersionSet::Any) => same,
            (VersionSet::Exact(a), VersionSet::Exact(b)) => a == b && same,
            (VersionSet::Exact(a), VersionSet::Range(lo, hi)) => {
                let contains = lo <= a && a < hi;
                contains == same
            }
            (VersionSet::Range(lo, hi), VersionSet::Exact(b)) => {
                let contains = lo <= b && b < hi;
                contains == same
            }
            (VersionSet::Range(l1, h1), VersionSet::Range(l2, h2)) => {
                let c = (l1 == l2 && h1 == h2) || (l1 <= l2 && h2 <= h1) || (l2 <= l1 && h1 <= h2);
                c == same
            }
        }
    }

    /// The strongest term implied by both `self` and `other`, if one exists.
    ///
    /// `None` when the two terms refer to different packages, to different
    /// requirement kinds, or when the implied term would be a logical
    /// impossibility (an empty version set).
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if self.package != other.package {
            return None;
        }
        let package = self.package.clone();
        match (&self.requirement, &other.requirement) {
            (Requirement::Revision(a), Requirement::Revision(b)) => {
                if a != b {
                    return None;
                }
                if self.positive && other.positive {
                    Some(Term::positive(package, Requirement::Revision(a.clone())))
                } else if !self.positive && !other.positive {
                    Some(Term::negative(package, Requirement::Revision(a.clone())))
                } else {
                    Some(Term::positive(package, Requirement::Revision(a.clone())))
                }
            }
            (Requirement::Unversioned, Requirement::Unversioned) => {
                Some(Term::positive(package, Requirement::Unversioned))
            }
            (Requirement::VersionSet(s), Requirement::VersionSet(o)) => {
                Self::intersect_version_sets(package, s, self.positive, o, other.positive)
            }
            _ => None,
        }
    }

    fn intersect_version_sets(
        package: P,
        s: &VersionSet<V>,
        s_pos: bool,
        o: &VersionSet<V>,
        o_pos: bool,
    ) -> Option<Self> {
        match (s_pos, o_pos) {
            (true, true) => {
                let inter = s.intersection(o);
                if inter.is_empty() {
                    None
                } else {
                    Some(Term::positive(package, Requirement::VersionSet(inter)))
                }
            }
            (false, false) => s
                .try_union(o)
                .map(|u| Term::negative(package, Requirement::VersionSet(u))),
            (true, false) => Self::version_set_difference(package, s, o),
            (false, true) => Self::version_set_difference(package, o, s),
        }
    }

    /// `positive minus negative`, clipping a range against another range.
    ///
    /// See §9: the clipping policy is asymmetric by design. A single
    /// contiguous range cannot represent a punctured interval, so on a
    /// partial overlap we keep whichever side of the cut survives -- the
    /// prefix when the negative range's upper bound reaches at least as far
    /// as the positive range's, the suffix otherwise. When the negative range
    /// is strictly interior (touching neither bound of the positive range),
    /// there is no single side to keep, so the positive range is returned
    /// unchanged rather than excising either end.
    fn version_set_difference(
        package: P,
        positive: &VersionSet<V>,
        negative: &VersionSet<V>,
    ) -> Option<Self> {
        let result = match (positive, negative) {
            (VersionSet::Empty, _) => VersionSet::Empty,
            (p, VersionSet::Empty) => p.clone(),
            (_, VersionSet::Any) => VersionSet::Empty,
            (VersionSet::Any, VersionSet::Exact(_)) => VersionSet::Any,
            (VersionSet::Any, VersionSet::Range(_, _)) => VersionSet::Any,
            (VersionSet::Exact(v), neg) => {
                if neg.contains(v) {
                    VersionSet::Empty
                } else {
                    VersionSet::Exact(v.clone())
                }
            }
            (VersionSet::Range(lo, hi), VersionSet::Exact(v)) => {
                if v < lo || hi <= v {
                    VersionSet::Range(lo.clone(), hi.clone())
                } else if v == lo {
                    VersionSet::range(v.bump(), hi.clone())
                } else {
                    // Interior puncture: a single range cannot represent the
                    // gap, so the range is kept whole.
                    VersionSet::Range(lo.clone(), hi.clone())
                }
            }
            (VersionSet::Range(l1, h1), VersionSet::Range(l2, h2)) => {
                if h2 <= l1 || h1 <= l2 {
                    VersionSet::Range(l1.clone(), h1.clone())
                } else if l2 <= l1 && h1 <= h2 {
                    VersionSet::Empty
                } else if l1 < l2 && h2 < h1 {
                    // Interior puncture: the negative range sits strictly
                    // inside the positive one, touching neither bound. A
                    // single range cannot represent the resulting gap, so the
                    // range is kept whole rather than excising either side.
                    VersionSet::Range(l1.clone(), h1.clone())
                } else if h1 <= h2 {
                    VersionSet::range(l1.clone(), l2.clone())
                } else {
                    VersionSet::range(h2.clone(), h1.clone())
                }
            }
        };
        if result.is_empty() {
            None
        } else {
            Some(Term::positive(package, Requirement::VersionSet(result)))
        }
    }

    /// `self` minus `other`, i.e. `self.intersect(&other.inverse())`.
    pub fn difference(&self, other: &Self) -> Option<Self> {
        self.intersect(&other.inverse())
    }

    /// The weakest term implied by `self` or `other`, via De Morgan:
    /// `union(a, b) = inverse(intersect(inverse(a), inverse(b)))`.
    ///
    /// Used by the rule of resolution during conflict resolution, where two
    /// incompatibilities sharing a package are combined.
    pub(crate) fn union(&self, other: &Self) -> Option<Self> {
        self.inverse().intersect(&other.inverse()).map(|t| t.inverse())
    }

    /// Relation of this term to the running intersection of a set of terms
    /// (`other`, a term over the same package).
    pub(crate) fn relation_with(&self, other: &Self) -> Relation {
        match self.intersect(other) {
            None => Relation::Contradicted,
            Some(inter) => {
                if &inter == other {
                    Relation::Satisfied
                } else if Self::is_empty_term(&inter) {
                    Relation::Contradicted
                } else {
                    Relation::Inconclusive
                }
            }
        }
    }

    fn is_empty_term(t: &Self) -> bool {
        matches!(
            (&t.requirement, t.positive),
            (Requirement::VersionSet(VersionSet::Empty), true)
        )
    }
}

impl<P: Package, V: Version, R: Revision> fmt::Display for Term<P, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.positive {
            write!(f, "{}", self.requirement)
        } else {
            write!(f, "not ({})", self.requirement)
        }
    }
}
