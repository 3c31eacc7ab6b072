// SPDX-License-Identifier: MPL-2.0

//! The public solving entry points, the collaborators a caller must supply
//! ([PackageContainerProvider], [Container]), and the container fetch cache
//! that serialises and memoises calls into them.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex};

use priority_queue::PriorityQueue;

use crate::error::PubGrubError;
use crate::internal::{Incompatibility, State};
use crate::package::Package;
use crate::requirement::Requirement;
use crate::revision::Revision;
use crate::term::Term;
use crate::type_aliases::{FxBuildHasher, Map, SelectedDependencies, Set};
use crate::version::Version;
use crate::version_set::VersionSet;

/// A future boxed the way async trait object APIs expect.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The concrete target a package was bound to once solving succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundVersion<V, R> {
    /// Bound to a specific version.
    Version(V),
    /// Bound to a specific, opaque revision.
    Revision(R),
    /// Bound to an unversioned (local/editable) source.
    Unversioned,
}

/// A provider-supplied handle exposing the versions and dependencies of one
/// package. Returned, wrapped in an `Arc`, by [PackageContainerProvider::get_container].
pub trait Container<P, V, R>: Send + Sync {
    /// Every version satisfying `filter`, ordered newest first.
    fn versions(&self, filter: &dyn Fn(&V) -> bool) -> Vec<V>;

    /// The direct dependencies declared at a given version.
    fn dependencies(&self, version: &V) -> Vec<(P, Requirement<V, R>)>;
}

/// An external collaborator able to asynchronously fetch a package's
/// [Container]. Implementations typically wrap a registry client or a git/
/// filesystem lookup.
pub trait PackageContainerProvider: Send + Sync {
    /// Package identifiers this provider understands.
    type P: Package + Send + Sync + 'static;
    /// Version type this provider's containers expose.
    type V: Version + Send + Sync + 'static;
    /// Revision type this provider's containers expose.
    type R: Revision + Send + Sync + 'static;
    /// Error type returned when a container cannot be fetched.
    type Err: std::error::Error + Send + Sync + 'static;

    /// Fetch the container for `id`. `skip_update` hints that a locally
    /// cached copy is acceptable even if a fresher one might exist upstream.
    fn get_container(
        &self,
        id: &Self::P,
        skip_update: bool,
    ) -> BoxFuture<'_, Result<Arc<dyn Container<Self::P, Self::V, Self::R>>, Self::Err>>;

    /// Checked once per outer solve iteration; returning `Err` aborts the
    /// solve early. Defaults to never cancelling.
    fn should_cancel(&self) -> Result<(), Self::Err> {
        Ok(())
    }
}

/// An optional, purely observational sink for solve progress. Has no effect
/// on the outcome; implement it to drive a progress bar or log line.
pub trait SolveDelegate<P, V, R>: Send + Sync {
    /// Called right after `package` is decided at `bound`.
    fn on_decision(&self, package: &P, bound: &BoundVersion<V, R>) {
        let _ = (package, bound);
    }
}

struct NoopDelegate;
impl<P, V, R> SolveDelegate<P, V, R> for NoopDelegate {}

/// Wraps a cache-shared `Arc<Err>` so it can be boxed as a plain
/// `dyn std::error::Error`, without depending on whether the standard
/// library happens to implement `Error` for `Arc<T>` directly.
#[derive(Debug)]
struct SharedError<E>(Arc<E>);

impl<E: std::fmt::Display> std::fmt::Display for SharedError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl<E: std::error::Error> std::error::Error for SharedError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

struct CacheState<P, V, R, Err> {
    memo: Map<P, Arc<Result<Arc<dyn Container<P, V, R>>, Arc<Err>>>>,
    prefetching: Set<P>,
}

/// Serialises and memoises [PackageContainerProvider::get_container] calls.
/// A single mutex guards the memo map and the set of ids currently being
/// prefetched; a condition variable wakes callers waiting on an in-flight
/// prefetch.
struct ContainerCache<P, V, R, Err> {
    state: Mutex<CacheState<P, V, R, Err>>,
    condvar: Condvar,
}

impl<P: Package, V, R, Err> ContainerCache<P, V, R, Err> {
    fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                memo: Map::default(),
                prefetching: Set::default(),
            }),
            condvar: Condvar::new(),
        }
    }

    /// Return the memoised container for `id`, fetching it (synchronously,
    /// via `handle.block_on`) if nothing is memoised and no prefetch is in
    /// flight; wait on the prefetch otherwise.
    fn get_container<Prov>(
        &self,
        id: &P,
        provider: &Prov,
        handle: &tokio::runtime::Handle,
    ) -> Result<Arc<dyn Container<P, V, R>>, Arc<Err>>
    where
        Prov: PackageContainerProvider<P = P, V = V, R = R, Err = Err>,
    {
        let mut guard = self.state.lock().unwrap();
        loop {
            if let Some(result) = guard.memo.get(id) {
                log::trace!("container cache hit for {id}");
                return (**result).clone();
            }
            if guard.prefetching.contains(id) {
                log::trace!("waiting on in-flight prefetch for {id}");
                guard = self.condvar.wait(guard).unwrap();
                continue;
            }
            guard.prefetching.insert(id.clone());
            break;
        }
        drop(guard);
        log::trace!("fetching container for {id}");
        let fetched = handle.block_on(provider.get_container(id, false));
        let mut guard = self.state.lock().unwrap();
        let stored = Arc::new(fetched.map_err(Arc::new));
        guard.memo.insert(id.clone(), stored.clone());
        guard.prefetching.remove(id);
        drop(guard);
        self.condvar.notify_all();
        (*stored).clone()
    }

    /// Spawn a background task fetching `id`'s container, if one is not
    /// already memoised or in flight. Best-effort: callers never wait on it
    /// directly, they will simply get a cache hit later if it lands in time.
    fn prefetch<Prov>(self: &Arc<Self>, id: P, provider: Arc<Prov>, handle: tokio::runtime::Handle)
    where
        Prov: PackageContainerProvider<P = P, V = V, R = R, Err = Err> + 'static,
        P: Send + 'static,
        V: Send + 'static,
        R: Send + 'static,
        Err: Send + 'static,
    {
        {
            let mut guard = self.state.lock().unwrap();
            if guard.memo.contains_key(&id) || guard.prefetching.contains(&id) {
                return;
            }
            guard.prefetching.insert(id.clone());
        }
        let cache = Arc::clone(self);
        handle.spawn(async move {
            log::trace!("prefetching container for {id}");
            let fetched = provider.get_container(&id, false).await;
            let mut guard = cache.state.lock().unwrap();
            guard.memo.insert(id.clone(), Arc::new(fetched.map_err(Arc::new)));
            guard.prefetching.remove(&id);
            drop(guard);
            cache.condvar.notify_all();
        });
    }
}

/// The final term a decided package carries must map onto a `BoundVersion`.
/// A lingering range or empty version set in a decided assignment is a
/// solver bug, not a caller mistake.
fn bind_term<P: Package, V: Version, R: Revision>(
    package: &P,
    term: &Term<P, V, R>,
) -> Result<BoundVersion<V, R>, PubGrubError<P, V, R>> {
    match term.requirement() {
        Requirement::VersionSet(VersionSet::Exact(v)) => Ok(BoundVersion::Version(v.clone())),
        Requirement::VersionSet(VersionSet::Any) => Ok(BoundVersion::Unversioned),
        Requirement::Revision(r) => Ok(BoundVersion::Revision(r.clone())),
        Requirement::Unversioned => Ok(BoundVersion::Unversioned),
        Requirement::VersionSet(VersionSet::Range(_, _)) | Requirement::VersionSet(VersionSet::Empty) => {
            debug_assert!(
                false,
                "{package} was decided with a non-singleton version set"
            );
            Err(PubGrubError::Failure(format!(
                "internal error: {package} was decided with a non-singleton version set"
            )))
        }
    }
}

/// Pick the next package to decide, fetch its container, register the
/// incompatibilities coming from its dependencies, and commit the decision.
/// Returns the decided package, or `None` once nothing is left to decide.
///
/// Evaluates exactly one version-set candidate per call: when the highest
/// priority candidate turns out to have no matching version, the resulting
/// `no_versions` incompatibility is registered and the function returns
/// immediately so the caller re-runs unit propagation on that same package,
/// which is what actually detects and reports the conflict. Trying several
/// candidates within one call before propagating would let a no-versions
/// incompatibility sit unexamined and the solve could wrongly report success.
#[allow(clippy::type_complexity)]
fn make_decision<Prov>(
    provider: &Arc<Prov>,
    cache: &Arc<ContainerCache<Prov::P, Prov::V, Prov::R, Prov::Err>>,
    handle: &tokio::runtime::Handle,
    delegate: &dyn SolveDelegate<Prov::P, Prov::V, Prov::R>,
    state: &mut State<Prov::P, Prov::V, Prov::R>,
) -> Result<Option<Prov::P>, PubGrubError<Prov::P, Prov::V, Prov::R>>
where
    Prov: PackageContainerProvider + 'static,
{
    // Revision/unversioned candidates have nothing to pick: their term is
    // already the final answer, decide the first one found.
    for (package, term) in state.partial_solution.unsatisfied() {
        if matches!(
            term.requirement(),
            Requirement::Revision(_) | Requirement::Unversioned
        ) {
            let package = package.clone();
            let term = term.clone();
            state.partial_solution.decide(package.clone(), term.clone());
            delegate.on_decision(&package, &bind_term(&package, &term)?);
            return Ok(Some(package));
        }
    }

    // Version-set candidates: fetch every one's container up front and rank
    // by how many matching versions it has, so the most-constrained package
    // (fewest candidates) is decided first -- the usual heuristic for
    // converging quickly.
    let mut fetched: Map<Prov::P, (Arc<dyn Container<Prov::P, Prov::V, Prov::R>>, Vec<Prov::V>)> =
        Map::default();
    let mut queue: PriorityQueue<Prov::P, Reverse<usize>, FxBuildHasher> = PriorityQueue::default();
    for (package, term) in state.partial_solution.unsatisfied() {
        let Requirement::VersionSet(vs) = term.requirement() else {
            continue;
        };
        let container = cache
            .get_container(package, provider.as_ref(), handle)
            .map_err(|source| PubGrubError::ErrorRetrievingContainer {
                package: package.clone(),
                source: Box::new(SharedError(source)),
            })?;
        let matching = container.versions(&|v| vs.contains(v));
        queue.push(package.clone(), Reverse(matching.len()));
        fetched.insert(package.clone(), (container, matching));
    }

    while let Some((package, _)) = queue.pop() {
        let (container, matching) = fetched
            .remove(&package)
            .expect("a queued package must have already been fetched");
        let Some(version) = matching.into_iter().next() else {
            let term = state
                .partial_solution
                .term_intersection_for_package(&package)
                .cloned()
                .expect("an unsatisfied candidate must have a term");
            state.add_incompatibility(Incompatibility::no_versions(package.clone(), term));
            return Ok(Some(package));
        };
        let deps = container.dependencies(&version);
        for (dep_package, dep_req) in &deps {
            if matches!(dep_req, Requirement::VersionSet(_)) {
                cache.prefetch(dep_package.clone(), Arc::clone(provider), handle.clone());
            }
        }
        state.add_incompatibility_from_dependencies(package.clone(), version.clone(), deps);
        let term = Term::positive(package.clone(), Requirement::exact(version));
        state.partial_solution.decide(package.clone(), term.clone());
        delegate.on_decision(&package, &bind_term(&package, &term)?);
        return Ok(Some(package));
    }

    Ok(None)
}

fn run<Prov>(
    provider: Arc<Prov>,
    root_package: Prov::P,
    root_version: Prov::V,
    root_dependencies: Option<Vec<(Prov::P, Requirement<Prov::V, Prov::R>)>>,
    pins: impl IntoIterator<Item = (Prov::P, Requirement<Prov::V, Prov::R>)>,
    delegate: &dyn SolveDelegate<Prov::P, Prov::V, Prov::R>,
) -> Result<SelectedDependencies<Prov::P, Prov::V, Prov::R>, PubGrubError<Prov::P, Prov::V, Prov::R>>
where
    Prov: PackageContainerProvider + 'static,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .build()
        .map_err(|err| {
            PubGrubError::Failure(format!("failed to start container fetch runtime: {err}"))
        })?;
    let handle = runtime.handle().clone();
    let cache = Arc::new(ContainerCache::new());

    let mut state = State::init(root_package.clone(), root_version.clone(), pins);
    if let Some(deps) = root_dependencies {
        state.force_root_decision(deps);
    }

    let mut next = root_package;
    loop {
        provider
            .should_cancel()
            .map_err(|err| PubGrubError::ErrorInShouldCancel(Box::new(err)))?;
        if let Err(terminal) = state.unit_propagation(next) {
            return Err(PubGrubError::Unresolvable(state.build_derivation_tree(terminal)));
        }
        match make_decision(&provider, &cache, &handle, delegate, &mut state)? {
            Some(package) => next = package,
            None => break,
        }
    }

    state
        .partial_solution
        .decided_assignments()
        .into_iter()
        .map(|(package, term)| {
            let bound = bind_term(&package, &term)?;
            Ok((package, bound))
        })
        .collect()
}

/// Solve for `root_package` at `root_version`, respecting `pins`.
///
/// `pins` is a list of `(package, requirement)` pairs; each is installed as
/// an incompatibility forbidding every target outside the pinned
/// requirement, exactly like the root package's own incompatibility.
pub fn solve<Prov>(
    provider: Arc<Prov>,
    root_package: Prov::P,
    root_version: Prov::V,
    pins: impl IntoIterator<Item = (Prov::P, Requirement<Prov::V, Prov::R>)>,
) -> Result<SelectedDependencies<Prov::P, Prov::V, Prov::R>, PubGrubError<Prov::P, Prov::V, Prov::R>>
where
    Prov: PackageContainerProvider + 'static,
{
    run(provider, root_package, root_version, None, pins, &NoopDelegate)
}

/// Like [solve], but also reports every decision to `delegate` as it happens.
pub fn solve_with_delegate<Prov>(
    provider: Arc<Prov>,
    root_package: Prov::P,
    root_version: Prov::V,
    pins: impl IntoIterator<Item = (Prov::P, Requirement<Prov::V, Prov::R>)>,
    delegate: &dyn SolveDelegate<Prov::P, Prov::V, Prov::R>,
) -> Result<SelectedDependencies<Prov::P, Prov::V, Prov::R>, PubGrubError<Prov::P, Prov::V, Prov::R>>
where
    Prov: PackageContainerProvider + 'static,
{
    run(provider, root_package, root_version, None, pins, delegate)
}

/// Solve a set of top-level constraints directly, without a pre-existing
/// root package. The first constraint's package becomes the synthetic
/// root's identity (its own requirement is not separately enforced, since a
/// package cannot coherently be both the root and a constraint on itself);
/// every other constraint becomes one of the root's declared dependencies.
pub fn solve_from_constraints<Prov>(
    provider: Arc<Prov>,
    constraints: impl IntoIterator<Item = (Prov::P, Requirement<Prov::V, Prov::R>)>,
    pins: impl IntoIterator<Item = (Prov::P, Requirement<Prov::V, Prov::R>)>,
) -> Result<SelectedDependencies<Prov::P, Prov::V, Prov::R>, PubGrubError<Prov::P, Prov::V, Prov::R>>
where
    Prov: PackageContainerProvider + 'static,
{
    let mut constraints = constraints.into_iter();
    let (root_package, _root_identity_requirement) = constraints.next().ok_or_else(|| {
        PubGrubError::Failure("solve_from_constraints requires at least one constraint".into())
    })?;
    let root_version = Prov::V::lowest();
    let root_dependencies: Vec<_> = constraints.collect();
    run(
        provider,
        root_package,
        root_version,
        Some(root_dependencies),
        pins,
        &NoopDelegate,
    )
}

/// An in-memory [PackageContainerProvider], primarily useful for tests: every
/// package/version/dependency triple is registered ahead of time with
/// [InMemoryContainerProvider::add_dependencies].
pub struct InMemoryContainerProvider<P: Package, V: Version, R: Revision> {
    containers: Map<P, InMemoryContainer<P, V, R>>,
}

#[derive(Clone)]
struct InMemoryContainer<P, V, R> {
    versions: BTreeMap<V, Vec<(P, Requirement<V, R>)>>,
}

impl<P: Package, V: Version, R: Revision> InMemoryContainerProvider<P, V, R> {
    /// An empty provider, with no packages registered.
    pub fn new() -> Self {
        Self {
            containers: Map::default(),
        }
    }

    /// Register a package version and its direct dependencies.
    pub fn add_dependencies(
        &mut self,
        package: P,
        version: V,
        deps: impl IntoIterator<Item = (P, Requirement<V, R>)>,
    ) {
        self.containers
            .entry(package)
            .or_insert_with(|| InMemoryContainer {
                versions: BTreeMap::new(),
            })
            .versions
            .insert(version, deps.into_iter().collect());
    }

    /// Register a package as known to this provider but with no versions at
    /// all, distinct from a package the provider has never heard of: fetching
    /// its container succeeds, but every requirement against it -- including
    /// [Requirement::any] -- comes back with no matching version, which
    /// surfaces as a "no versions" incompatibility rather than as
    /// [UnknownPackage].
    pub fn declare_empty(&mut self, package: P) {
        self.containers.entry(package).or_insert_with(|| InMemoryContainer {
            versions: BTreeMap::new(),
        });
    }
}

impl<P: Package, V: Version, R: Revision> Default for InMemoryContainerProvider<P, V, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, V, R> Container<P, V, R> for InMemoryContainer<P, V, R>
where
    P: Package + Send + Sync + 'static,
    V: Version + Send + Sync + 'static,
    R: Revision + Send + Sync + 'static,
{
    fn versions(&self, filter: &dyn Fn(&V) -> bool) -> Vec<V> {
        self.versions.keys().rev().filter(|v| filter(v)).cloned().collect()
    }

    fn dependencies(&self, version: &V) -> Vec<(P, Requirement<V, R>)> {
        self.versions.get(version).cloned().unwrap_or_default()
    }
}

/// Returned by [InMemoryContainerProvider] when asked for a package it was
/// never told about.
#[derive(Debug, thiserror::Error)]
#[error("package {0} is not known to this in-memory provider")]
pub struct UnknownPackage<P: Package>(pub P);

impl<P, V, R> PackageContainerProvider for InMemoryContainerProvider<P, V, R>
where
    P: Package + Send + Sync + 'static,
    V: Version + Send + Sync + 'static,
    R: Revision + Send + Sync + 'static,
{
    type P = P;
    type V = V;
    type R = R;
    type Err = UnknownPackage<P>;

    fn get_container(
        &self,
        id: &P,
        _skip_update: bool,
    ) -> BoxFuture<'_, Result<Arc<dyn Container<P, V, R>>, Self::Err>> {
        let result = self
            .containers
            .get(id)
            .cloned()
            .map(|c| Arc::new(c) as Arc<dyn Container<P, V, R>>)
            .ok_or_else(|| UnknownPackage(id.clone()));
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::NumberVersion;

    fn provider() -> InMemoryContainerProvider<&'static str, NumberVersion, String> {
        let mut provider = InMemoryContainerProvider::new();
        provider.add_dependencies("root", NumberVersion(0), []);
        provider
    }

    #[test]
    fn trivial_root_solves_to_just_root() {
        let provider = Arc::new(provider());
        let solution = solve(provider, "root", NumberVersion(0), []).unwrap();
        assert_eq!(solution, vec![("root", BoundVersion::Version(NumberVersion(0)))]);
    }

    #[test]
    fn missing_dependency_container_is_reported() {
        let mut provider = InMemoryContainerProvider::new();
        provider.add_dependencies(
            "root",
            NumberVersion(0),
            [("missing", Requirement::any())],
        );
        let provider = Arc::new(provider);
        let err = solve(provider, "root", NumberVersion(0), []).unwrap_err();
        assert!(matches!(err, PubGrubError::ErrorRetrievingContainer { .. }));
    }
}
