//! The dependency container: registry, resolution cache and teardown
//!
//! A [`Container`] maps tags to recipes and lazily materializes singleton
//! instances on first resolve. The in-flight construction itself is the
//! cache entry, a shared future installed before the factory settles, so
//! concurrent resolvers of one tag always join the same construction and
//! the factory runs at most once per successful resolution.

use crate::chain::ResolutionChain;
use crate::context::{ErasedResolver, ResolutionContext, Resolver, sealed};
use crate::error::{DiError, Result};
use crate::recipe::{AnyInstance, Recipe};
use crate::tag::{ErasedTag, Injectable, Tag};
use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// An in-flight-or-settled construction, shared by every concurrent
/// resolver of one tag.
pub(crate) type SharedResolution = Shared<BoxFuture<'static, Result<AnyInstance>>>;

/// Shared state behind [`Container`] and each scope of a scoped tree.
pub(crate) struct Core {
    /// Tag -> construction recipe
    registry: DashMap<ErasedTag, Recipe, RandomState>,
    /// Tag -> in-flight-or-settled construction
    cache: DashMap<ErasedTag, SharedResolution, RandomState>,
    /// Irreversible teardown flag
    destroyed: AtomicBool,
}

impl Core {
    pub(crate) fn new() -> Self {
        // 8 shards: DI registries are small, default sharding is overkill
        Self {
            registry: DashMap::with_capacity_and_hasher_and_shard_amount(
                0,
                RandomState::new(),
                8,
            ),
            cache: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
            destroyed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Whether this core has its own registration for `tag`.
    #[inline]
    pub(crate) fn has_local(&self, tag: ErasedTag) -> bool {
        self.registry.contains_key(&tag)
    }

    /// Whether `tag` has a live (in-flight or settled) cache entry.
    #[cfg(test)]
    pub(crate) fn instantiated(&self, tag: ErasedTag) -> bool {
        self.cache.contains_key(&tag)
    }

    /// Store a recipe under `tag`.
    ///
    /// Overwriting a registered-but-never-resolved tag is allowed (test
    /// doubles can shadow defaults before first use); overwriting a tag
    /// with a live cache entry is rejected. The instantiation check and the
    /// insert are two steps, not one: a registration racing the very first
    /// resolve of the same tag can slip past the check. Finish registering
    /// before handing the container to resolvers.
    pub(crate) fn register(&self, tag: ErasedTag, recipe: Recipe) -> Result<()> {
        if self.is_destroyed() {
            return Err(DiError::ContainerDestroyed);
        }
        if self.cache.contains_key(&tag) {
            return Err(DiError::AlreadyInstantiated { tag });
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "plexus_di",
            tag = %tag,
            has_finalizer = recipe.finalizer.is_some(),
            "Registering dependency"
        );

        self.registry.insert(tag, recipe);
        Ok(())
    }

    /// Resolve `tag` on this core, threading `chain` for cycle detection.
    ///
    /// `resolver` is what factory contexts get bound to; for a plain
    /// container that is the core itself, for a scoped container it is the
    /// scope, so factory sub-resolution sees parent delegation.
    pub(crate) fn resolve_with(
        self: Arc<Self>,
        tag: ErasedTag,
        chain: ResolutionChain,
        resolver: Arc<dyn ErasedResolver>,
    ) -> BoxFuture<'static, Result<AnyInstance>> {
        Box::pin(async move {
            if self.is_destroyed() {
                return Err(DiError::ContainerDestroyed);
            }

            // The cycle check must precede the cache check: a tag pending in
            // our own chain has an in-flight entry that we must never await.
            if chain.contains(tag) {
                let chain = chain.extended(tag);
                #[cfg(feature = "logging")]
                debug!(target: "plexus_di", tag = %tag, chain = %chain, "Circular dependency detected");
                return Err(DiError::CircularDependency { tag, chain });
            }

            if let Some(entry) = self.cache.get(&tag).map(|e| e.value().clone()) {
                #[cfg(feature = "logging")]
                trace!(target: "plexus_di", tag = %tag, "Joining existing cache entry");
                return self.await_entry(tag, entry).await;
            }

            let recipe = match self.registry.get(&tag) {
                Some(recipe) => recipe.value().clone(),
                None => {
                    #[cfg(feature = "logging")]
                    debug!(target: "plexus_di", tag = %tag, "Unknown dependency");
                    return Err(DiError::UnknownDependency { tag });
                }
            };

            // Install the entry before the factory settles, under the map's
            // entry lock, so a concurrent resolver either sees this entry or
            // installs the single winning one.
            let entry = match self.cache.entry(tag) {
                Entry::Occupied(occupied) => occupied.get().clone(),
                Entry::Vacant(vacant) => {
                    #[cfg(feature = "logging")]
                    debug!(target: "plexus_di", tag = %tag, "Instantiating dependency");

                    let ctx = ResolutionContext::new(resolver, chain.extended(tag));
                    let factory = Arc::clone(&recipe.factory);
                    let fut: BoxFuture<'static, Result<AnyInstance>> = Box::pin(async move {
                        match (factory)(ctx).await {
                            Ok(value) => Ok(value),
                            Err(cause) => Err(DiError::creation(tag, cause)),
                        }
                    });
                    let shared = fut.shared();
                    vacant.insert(shared.clone());
                    shared
                }
            };

            self.await_entry(tag, entry).await
        })
    }

    /// Await one cache entry; purge it on failure so a retry can succeed.
    async fn await_entry(&self, tag: ErasedTag, entry: SharedResolution) -> Result<AnyInstance> {
        let outcome = entry.clone().await;
        if outcome.is_err() {
            // Remove only the entry we awaited; ptr_eq makes the purge
            // idempotent across every caller that shared the failure.
            self.cache.remove_if(&tag, |_, existing| existing.ptr_eq(&entry));

            #[cfg(feature = "logging")]
            debug!(target: "plexus_di", tag = %tag, "Construction failed, cache entry purged");
        }
        outcome
    }

    /// Flip the destroyed flag; true when this call made the transition.
    pub(crate) fn begin_destroy(&self) -> bool {
        !self.destroyed.swap(true, Ordering::AcqRel)
    }

    /// Run finalizers for every settled instance, concurrently, and clear
    /// the cache. Returns the collected failures.
    pub(crate) async fn run_finalizers(&self) -> Vec<(ErasedTag, DiError)> {
        let mut jobs = Vec::new();
        for entry in self.cache.iter() {
            // Pending or failed entries have nothing to finalize
            let Some(Ok(instance)) = entry.value().peek() else {
                continue;
            };
            let Some(recipe) = self.registry.get(entry.key()) else {
                continue;
            };
            if let Some(finalizer) = recipe.finalizer.clone() {
                jobs.push((*entry.key(), finalizer, Arc::clone(instance)));
            }
        }
        self.cache.clear();

        #[cfg(feature = "logging")]
        debug!(target: "plexus_di", finalizers = jobs.len(), "Running finalizers");

        let settled = futures::future::join_all(jobs.into_iter().map(
            |(tag, finalizer, instance)| async move { (tag, (finalizer)(instance).await) },
        ))
        .await;

        settled
            .into_iter()
            .filter_map(|(tag, outcome)| outcome.err().map(|error| (tag, error)))
            .collect()
    }
}

impl ErasedResolver for Core {
    fn resolve_chained(
        self: Arc<Self>,
        tag: ErasedTag,
        chain: ResolutionChain,
    ) -> BoxFuture<'static, Result<AnyInstance>> {
        let resolver: Arc<dyn ErasedResolver> = self.clone();
        self.resolve_with(tag, chain, resolver)
    }
}

/// A registry of lazily-created singleton dependencies.
///
/// Cloning the handle is cheap; clones share the same registry and cache.
///
/// # Examples
///
/// ```rust
/// use plexus_di::{Container, Resolver, Tag};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> plexus_di::Result<()> {
/// let base: Tag<u32> = Tag::new("base");
/// let doubled: Tag<u32> = Tag::new("doubled");
///
/// let container = Container::new();
/// container
///     .register(&base, |_ctx| async { Ok(21) })?
///     .register(&doubled, move |ctx| async move {
///         let base = ctx.resolve(&base).await?;
///         Ok(*base * 2)
///     })?;
///
/// assert_eq!(*container.resolve(&doubled).await?, 42);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Container {
    core: Arc<Core>,
}

impl Container {
    /// Create a new empty container.
    pub fn new() -> Self {
        #[cfg(feature = "logging")]
        debug!(target: "plexus_di", "Creating new container");

        Self {
            core: Arc::new(Core::new()),
        }
    }

    /// Register an asynchronous factory for `tag`.
    ///
    /// The factory receives a [`ResolutionContext`] through which it may
    /// resolve its own dependencies; it runs lazily, at most once per
    /// successful resolution.
    ///
    /// Re-registering a tag that was already resolved (or is mid-flight)
    /// fails with [`DiError::AlreadyInstantiated`]; re-registering a tag
    /// that was only registered silently replaces the recipe. Registration
    /// is not synchronized against a concurrent first resolve of the same
    /// tag, so finish registering before resolution starts.
    pub fn register<T, F, Fut>(&self, tag: &Tag<T>, factory: F) -> Result<&Self>
    where
        T: Injectable,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.core.register(tag.erased(), Recipe::new(factory))?;
        Ok(self)
    }

    /// Register a factory together with a finalizer.
    ///
    /// The finalizer runs during [`Container::destroy`], and only if the
    /// dependency was actually instantiated.
    pub fn register_with_finalizer<T, F, Fut, D, DFut>(
        &self,
        tag: &Tag<T>,
        factory: F,
        finalizer: D,
    ) -> Result<&Self>
    where
        T: Injectable,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        D: Fn(Arc<T>) -> DFut + Send + Sync + 'static,
        DFut: Future<Output = Result<()>> + Send + 'static,
    {
        let recipe = Recipe::new(factory).with_finalizer(finalizer);
        self.core.register(tag.erased(), recipe)?;
        Ok(self)
    }

    /// Register an already-constructed value for `tag`.
    ///
    /// No factory work happens at resolve time; the container just hands
    /// out the shared instance.
    pub fn register_instance<T: Injectable>(&self, tag: &Tag<T>, instance: T) -> Result<&Self> {
        let recipe = Recipe::from_instance(Arc::new(instance));
        self.core.register(tag.erased(), recipe)?;
        Ok(self)
    }

    /// Whether `tag` is registered (instantiated or not).
    #[inline]
    pub fn has<T: Injectable>(&self, tag: &Tag<T>) -> bool {
        self.core.has_local(tag.erased())
    }

    /// Whether this container has been destroyed.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }

    /// Tear the container down.
    ///
    /// Finalizers of instantiated dependencies run concurrently; failures
    /// are collected without aborting siblings and reported as one
    /// [`DiError::Finalization`]. The destroyed state commits either way,
    /// and repeated calls succeed immediately without re-running anything.
    pub async fn destroy(&self) -> Result<()> {
        if !self.core.begin_destroy() {
            return Ok(());
        }

        #[cfg(feature = "logging")]
        debug!(target: "plexus_di", "Destroying container");

        let causes = self.core.run_finalizers().await;
        if causes.is_empty() {
            Ok(())
        } else {
            Err(DiError::Finalization { causes })
        }
    }

    /// Combine two containers into a new one.
    ///
    /// Registrations and cached instances from both sides are copied;
    /// `other` wins on conflicting tags. Neither operand is modified.
    pub fn merge(&self, other: &Container) -> Result<Container> {
        if self.is_destroyed() || other.is_destroyed() {
            return Err(DiError::ContainerDestroyed);
        }

        let merged = Container::new();
        for source in [self, other] {
            for entry in source.core.registry.iter() {
                merged.core.registry.insert(*entry.key(), entry.value().clone());
            }
            for entry in source.core.cache.iter() {
                merged.core.cache.insert(*entry.key(), entry.value().clone());
            }
        }
        Ok(merged)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registrations", &self.core.registry.len())
            .field("instantiated", &self.core.cache.len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl sealed::Sealed for Container {}

impl Resolver for Container {
    fn resolve_erased(&self, tag: ErasedTag) -> BoxFuture<'static, Result<AnyInstance>> {
        let resolver: Arc<dyn ErasedResolver> = self.core.clone();
        Arc::clone(&self.core).resolve_with(tag, ResolutionChain::empty(), resolver)
    }
}
