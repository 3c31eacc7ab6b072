// SPDX-License-Identifier: MPL-2.0

//! A closed set of version constraints.
//!
//! Unlike a general interval-union version set, [VersionSet] only ever
//! represents a single contiguous half-open range (or one of the two
//! degenerate cases, [VersionSet::Empty] and [VersionSet::Any]). That is
//! enough to express the constraint kinds a [Requirement](crate::requirement::Requirement)
//! can carry, and it keeps intersection and containment checks branch-free.

use std::fmt;

use crate::version::Version;

/// A set of versions, restricted to the shapes that show up in a dependency
/// declaration: nothing, everything, a single version, or a half-open range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VersionSet<V> {
    /// The empty set: no version satisfies it.
    Empty,
    /// The set of all versions.
    Any,
    /// A single version.
    Exact(V),
    /// `lo <= v < hi`.
    Range(V, V),
}

impl<V: Version> VersionSet<V> {
    /// `lo <= v < hi`. Returns [VersionSet::Empty] if `lo >= hi`.
    pub fn range(lo: V, hi: V) -> Self {
        if lo < hi {
            Self::Range(lo, hi)
        } else {
            Self::Empty
        }
    }

    /// Evaluate membership of a version in this set.
    pub fn contains(&self, v: &V) -> bool {
        match self {
            Self::Empty => false,
            Self::Any => true,
            Self::Exact(x) => x == v,
            Self::Range(lo, hi) => lo <= v && v < hi,
        }
    }

    /// The half-open range `[lo, hi)` a non-empty, non-any set spans, treating
    /// [VersionSet::Exact] as the single-version range `[v, v.bump())`.
    fn bounds(&self) -> Option<(V, V)> {
        match self {
            Self::Empty | Self::Any => None,
            Self::Exact(v) => Some((v.clone(), v.bump())),
            Self::Range(lo, hi) => Some((lo.clone(), hi.clone())),
        }
    }

    /// Intersection with another set, per §3: `empty ∩ x = empty`;
    /// `any ∩ x = x`; `exact(v) ∩ s = exact(v)` if `s` contains `v` else empty;
    /// `range ∩ range` is the overlap, empty if disjoint.
    pub fn intersection(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Empty, _) | (_, Self::Empty) => Self::Empty,
            (Self::Any, s) | (s, Self::Any) => s.clone(),
            (Self::Exact(v), s) | (s, Self::Exact(v)) => {
                if s.contains(v) {
                    Self::Exact(v.clone())
                } else {
                    Self::Empty
                }
            }
            (Self::Range(l1, h1), Self::Range(l2, h2)) => {
                Self::range(max(l1, l2).clone(), min(h1, h2).clone())
            }
        }
    }

    /// Union with another set, when it is representable as a single set: the
    /// two sets must overlap or touch, or one must be `empty`/`any`/equal to
    /// the other. Returns `None` if the union would be two disjoint pieces,
    /// which this closed lattice cannot represent.
    pub fn try_union(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Any, _) | (_, Self::Any) => Some(Self::Any),
            (Self::Empty, s) | (s, Self::Empty) => Some(s.clone()),
            (a, b) if a == b => Some(a.clone()),
            _ => {
                let (l1, h1) = self.bounds()?;
                let (l2, h2) = other.bounds()?;
                let overlap_or_touch = l1 <= h2 && l2 <= h1;
                if overlap_or_touch {
                    Some(Self::Range(min(&l1, &l2).clone(), max(&h1, &h2).clone()))
                } else {
                    None
                }
            }
        }
    }

    /// Whether this set is the empty set.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

fn min<'a, T: Ord>(a: &'a T, b: &'a T) -> &'a T {
    if a <= b {
        a
    } else {
        b
    }
}

fn max<'a, T: Ord>(a: &'a T, b: &'a T) -> &'a T {
    if a >= b {
        a
    } else {
        b
    }
}

impl<V: Version> fmt::Display for VersionSet<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "∅"),
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "{v}"),
            Self::Range(lo, hi) => write!(f, ">= {lo}, < {hi}"),
        }
    }
}
