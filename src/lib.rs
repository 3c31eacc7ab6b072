// SPDX-License-Identifier: MPL-2.0

//! PubGrub version solving algorithm, adapted to resolve against
//! asynchronously-fetched package containers rather than a single
//! synchronous dependency provider.
//!
//! Version solving consists in efficiently finding a set of packages and
//! versions that satisfy all the constraints of a given project's
//! dependencies. In addition, when that is not possible, this crate tries to
//! provide a human-readable explanation of why it failed.
//!
//! # Package, Version, and Revision traits
//!
//! All the code in this crate manipulates packages, versions, and revisions
//! through three traits: [Package], [Version](version::Version), and
//! [Revision]. Each is automatically implemented for any type that already
//! implements [Clone] + [Eq] + [Hash](std::hash::Hash) + [Debug](std::fmt::Debug)
//! + [Display](std::fmt::Display) ([Version] additionally requires [Ord] and
//! a way to produce the lowest version and the next version after a given
//! one). So things like [String] work out of the box as a package
//! identifier, and this crate also provides [SemanticVersion] and
//! [NumberVersion](version::NumberVersion) for versions.
//!
//! A dependency is not always a version constraint: it might pin a specific
//! revision (a git commit, say) or accept an unversioned, local source
//! regardless of what's at it. [Requirement] captures all three shapes, and
//! [VersionSet] captures the version-constraint shape specifically (nothing,
//! everything, a single version, or a half-open range).
//!
//! # Basic example
//!
//! ```
//! # use pubgrub::{solve, InMemoryContainerProvider, NumberVersion, Requirement};
//! # use std::sync::Arc;
//! #
//! let mut provider = InMemoryContainerProvider::<&str, NumberVersion, String>::new();
//! provider.add_dependencies(
//!     "root",
//!     NumberVersion(1),
//!     [("menu", Requirement::any()), ("icons", Requirement::any())],
//! );
//! provider.add_dependencies("menu", NumberVersion(1), [("dropdown", Requirement::any())]);
//! provider.add_dependencies("dropdown", NumberVersion(1), [("icons", Requirement::any())]);
//! provider.add_dependencies("icons", NumberVersion(1), []);
//!
//! let solution = solve(Arc::new(provider), "root", NumberVersion(1), []).unwrap();
//! ```
//!
//! # The PackageContainerProvider trait
//!
//! In the example above we used [InMemoryContainerProvider], a basic
//! in-memory implementation of [PackageContainerProvider] mostly useful for
//! tests. A real implementation wraps something that can actually fetch
//! package metadata -- a registry client, a git/filesystem lookup -- and
//! returns it asynchronously as an `Arc<dyn Container>`:
//!
//! ```
//! # use pubgrub::{BoxFuture, Container, NumberVersion, PackageContainerProvider};
//! # use std::sync::Arc;
//! # use std::convert::Infallible;
//! #
//! struct MyProvider;
//!
//! impl PackageContainerProvider for MyProvider {
//!     type P = String;
//!     type V = NumberVersion;
//!     type R = String;
//!     type Err = Infallible;
//!
//!     fn get_container(
//!         &self,
//!         id: &String,
//!         skip_update: bool,
//!     ) -> BoxFuture<'_, Result<Arc<dyn Container<String, NumberVersion, String>>, Infallible>> {
//!         unimplemented!()
//!     }
//! }
//! ```
//!
//! [Container::versions] returns every version matching a filter, newest
//! first; [Container::dependencies] returns the direct dependencies declared
//! at a given version. Fetches are serialised and memoised per package by an
//! internal cache, so implementations don't need their own deduplication.
//!
//! # Solution and error reporting
//!
//! When everything goes well, [solve] returns the complete set of direct and
//! indirect dependencies satisfying every constraint, as
//! [SelectedDependencies<P, V, R>](SelectedDependencies). When there is no
//! solution, it returns [PubGrubError::Unresolvable], carrying a
//! [DerivationTree] with the full chain of reasons.
//!
//! Every node in that tree is an incompatibility, either "external" (a leaf,
//! independent of how the algorithm itself works -- a dependency
//! relationship, a missing version, a pin) or "derived" (obtained by
//! deduction from two others during conflict resolution).
//!
//! This crate defines a [Reporter] trait, with an associated
//! [Output](Reporter::Output) type and a `report` method; [DefaultStringReporter]
//! is a ready-made implementation producing a human-readable [String]:
//!
//! ```
//! # use pubgrub::{solve, InMemoryContainerProvider, DefaultStringReporter, NumberVersion, Reporter, PubGrubError};
//! # use std::sync::Arc;
//! #
//! # let provider = Arc::new(InMemoryContainerProvider::<&str, NumberVersion, String>::new());
//! match solve(provider, "root", NumberVersion(1), []) {
//!     Ok(solution) => println!("{:?}", solution),
//!     Err(PubGrubError::Unresolvable(derivation_tree)) => {
//!         eprintln!("{}", DefaultStringReporter::report(&derivation_tree));
//!     }
//!     Err(err) => panic!("{:?}", err),
//! };
//! ```

#![warn(missing_docs)]

mod error;
mod internal;
mod package;
mod report;
mod requirement;
mod revision;
mod solver;
mod term;
mod type_aliases;
mod version;
mod version_set;

pub use error::PubGrubError;
pub use package::Package;
pub use report::{
    DefaultStringReportFormatter, DefaultStringReporter, DerivationTree, Derived, External,
    ReportFormatter, Reporter,
};
pub use requirement::Requirement;
pub use revision::Revision;
pub use solver::{
    solve, solve_from_constraints, solve_with_delegate, BoundVersion, BoxFuture, Container,
    InMemoryContainerProvider, PackageContainerProvider, SolveDelegate, UnknownPackage,
};
pub use term::Term;
pub use type_aliases::{DependencyConstraints, SelectedDependencies};
pub use version::{NumberVersion, SemanticVersion, Version};
pub use version_set::VersionSet;
