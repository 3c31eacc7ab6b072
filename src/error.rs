// SPDX-License-Identifier: MPL-2.0

//! Handling pubgrub errors.

use thiserror::Error;

use crate::package::Package;
use crate::report::DerivationTree;
use crate::revision::Revision;
use crate::version::Version;

/// Errors that may occur while solving dependencies.
#[derive(Error, Debug)]
pub enum PubGrubError<P: Package, V: Version, R: Revision> {
    /// There is no solution satisfying every constraint. The derivation tree
    /// explains why; pass it to a [Reporter](crate::report::Reporter) for a
    /// human-readable explanation.
    #[error("no solution")]
    Unresolvable(DerivationTree<P, V, R>),

    /// The [PackageContainerProvider](crate::solver::PackageContainerProvider)
    /// returned an error while fetching the container for `package`.
    #[error("failed to fetch container for {package}")]
    ErrorRetrievingContainer {
        /// Package whose container could not be fetched.
        package: P,
        /// Error raised by the provider implementation.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The caller's cancellation hook aborted the solve.
    #[error("solve was cancelled")]
    ErrorInShouldCancel(Box<dyn std::error::Error + Send + Sync>),

    /// Something unexpected happened. Reserved for conditions that should be
    /// unreachable in a correct caller (e.g. an empty constraint set passed
    /// to [solve_from_constraints](crate::solver::solve_from_constraints)),
    /// kept as a recoverable error rather than a panic because it is
    /// triggerable from outside the crate.
    #[error("{0}")]
    Failure(String),
}
