// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Trait for identifying opaque revisions (e.g. a git commit or branch tip).
//! Automatically implemented for types implementing
//! [Clone] + [Eq] + [Hash] + [Debug] + [Display](std::fmt::Display).

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// An opaque revision identifier, used by [Requirement::Revision](crate::requirement::Requirement::Revision).
///
/// Revisions are compared only for equality: there is no ordering between them,
/// unlike [Version](crate::version::Version).
pub trait Revision: Clone + Eq + Hash + Debug + Display {}

impl<T: Clone + Eq + Hash + Debug + Display> Revision for T {}
