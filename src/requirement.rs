// SPDX-License-Identifier: MPL-2.0

//! A [Requirement] is what a dependent declares about an acceptable set of
//! targets for a dependency: a version constraint, a pinned revision, or an
//! unversioned (local/editable) source.

use std::fmt;

use crate::revision::Revision;
use crate::version::Version;
use crate::version_set::VersionSet;

/// What a dependency declaration can ask for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Requirement<V, R> {
    /// A constraint on the package's version.
    VersionSet(VersionSet<V>),
    /// A pinned, opaque revision (e.g. a git commit).
    Revision(R),
    /// A local or editable source, accepted regardless of version.
    Unversioned,
}

impl<V: Version, R: Revision> Requirement<V, R> {
    /// The requirement that accepts anything.
    pub fn any() -> Self {
        Self::VersionSet(VersionSet::Any)
    }

    /// The requirement that accepts nothing.
    pub fn none() -> Self {
        Self::VersionSet(VersionSet::Empty)
    }

    /// The requirement that accepts exactly one version.
    pub fn exact(v: V) -> Self {
        Self::VersionSet(VersionSet::Exact(v))
    }

    /// The requirement `lo <= v < hi`.
    pub fn range(lo: V, hi: V) -> Self {
        Self::VersionSet(VersionSet::range(lo, hi))
    }
}

impl<V: Version, R: Revision> fmt::Display for Requirement<V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionSet(vs) => write!(f, "{vs}"),
            Self::Revision(r) => write!(f, "revision {r}"),
            Self::Unversioned => write!(f, "unversioned"),
        }
    }
}
