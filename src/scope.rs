//! Scoped container trees
//!
//! A [`ScopedContainer`] is a container node in a parent/child tree,
//! typically one node per lifetime boundary (application, session, request).
//! Resolution prefers local registrations and otherwise delegates to the
//! parent, so parent-level singletons are identity-shared across every
//! descendant. Teardown cascades downward: all live children are destroyed
//! concurrently before the parent runs its own finalizers, because child
//! services may hold references into parent services.
//!
//! The parent tracks children through weak references only; dropping a
//! child handle releases the child without any bookkeeping on the parent.

use crate::chain::ResolutionChain;
use crate::container::Core;
use crate::context::{ErasedResolver, Resolver, sealed};
use crate::error::{DiError, Result};
use crate::recipe::{AnyInstance, Recipe};
use crate::tag::{ErasedTag, Injectable, Tag};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

#[cfg(feature = "logging")]
use tracing::debug;

/// Unique scope identifier.
///
/// Each scope gets a unique ID for tracking and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

pub(crate) struct ScopedInner {
    core: Arc<Core>,
    parent: Option<Arc<ScopedInner>>,
    /// Weakly-held children: teardown reaches live ones, dropped ones
    /// disappear without deregistration.
    children: Mutex<Vec<Weak<ScopedInner>>>,
    id: ScopeId,
    label: String,
}

impl ScopedInner {
    /// Resolve on this scope: locally when a registration exists, else by
    /// delegating upward. The chain travels with the call either way, so
    /// cycles spanning scopes are still detected.
    fn resolve_scoped(
        this: &Arc<Self>,
        tag: ErasedTag,
        chain: ResolutionChain,
    ) -> BoxFuture<'static, Result<AnyInstance>> {
        if this.core.is_destroyed() {
            return Box::pin(futures::future::ready(Err(DiError::ContainerDestroyed)));
        }
        match &this.parent {
            Some(parent) if !this.core.has_local(tag) => Self::resolve_scoped(parent, tag, chain),
            _ => {
                let resolver: Arc<dyn ErasedResolver> = this.clone();
                Arc::clone(&this.core).resolve_with(tag, chain, resolver)
            }
        }
    }

    fn has(&self, tag: ErasedTag) -> bool {
        self.core.has_local(tag) || self.parent.as_ref().is_some_and(|parent| parent.has(tag))
    }

    /// Destroy this scope and everything below it, returning collected
    /// finalizer failures. Children settle fully before own finalizers run.
    fn destroy_tree(self: Arc<Self>) -> BoxFuture<'static, Vec<(ErasedTag, DiError)>> {
        Box::pin(async move {
            if !self.core.begin_destroy() {
                return Vec::new();
            }

            #[cfg(feature = "logging")]
            debug!(target: "plexus_di", scope = %self.id, label = %self.label, "Destroying scope");

            let children: Vec<Arc<ScopedInner>> = {
                let mut slots = self.children.lock().unwrap();
                slots.drain(..).filter_map(|weak| weak.upgrade()).collect()
            };

            let mut causes = Vec::new();
            let child_batches = futures::future::join_all(
                children.into_iter().map(|child| child.destroy_tree()),
            )
            .await;
            for mut batch in child_batches {
                causes.append(&mut batch);
            }

            causes.extend(self.core.run_finalizers().await);
            causes
        })
    }
}

impl ErasedResolver for ScopedInner {
    fn resolve_chained(
        self: Arc<Self>,
        tag: ErasedTag,
        chain: ResolutionChain,
    ) -> BoxFuture<'static, Result<AnyInstance>> {
        Self::resolve_scoped(&self, tag, chain)
    }
}

/// A container node in a parent/child scope tree.
///
/// # Examples
///
/// ```rust
/// use plexus_di::{Resolver, ScopedContainer, Tag};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> plexus_di::Result<()> {
/// let pool: Tag<String> = Tag::new("db.pool");
///
/// let app = ScopedContainer::new("application");
/// app.register(&pool, |_ctx| async { Ok("pool".to_string()) })?;
///
/// let request = app.child("request")?;
///
/// // The parent's singleton is shared with every child
/// let from_app = app.resolve(&pool).await?;
/// let from_request = request.resolve(&pool).await?;
/// assert!(std::sync::Arc::ptr_eq(&from_app, &from_request));
///
/// // Children tear down before the parent's own finalizers
/// app.destroy().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ScopedContainer {
    inner: Arc<ScopedInner>,
}

impl ScopedContainer {
    /// Create a root scope.
    pub fn new(label: impl Into<String>) -> Self {
        let id = ScopeId::next();
        let label = label.into();

        #[cfg(feature = "logging")]
        debug!(target: "plexus_di", scope = %id, label = %label, "Creating root scope");

        Self {
            inner: Arc::new(ScopedInner {
                core: Arc::new(Core::new()),
                parent: None,
                children: Mutex::new(Vec::new()),
                id,
                label,
            }),
        }
    }

    /// Create a child scope of this one.
    ///
    /// The parent holds the child only weakly: dropping every handle to the
    /// child releases it without any explicit deregistration.
    ///
    /// Fails with [`DiError::ContainerDestroyed`] once this scope has been
    /// destroyed; a destroyed scope must not mint children that would escape
    /// the teardown cascade.
    pub fn child(&self, label: impl Into<String>) -> Result<ScopedContainer> {
        if self.inner.core.is_destroyed() {
            return Err(DiError::ContainerDestroyed);
        }

        let id = ScopeId::next();
        let label = label.into();

        #[cfg(feature = "logging")]
        debug!(
            target: "plexus_di",
            scope = %id,
            label = %label,
            parent = %self.inner.id,
            "Creating child scope"
        );

        let child = Arc::new(ScopedInner {
            core: Arc::new(Core::new()),
            parent: Some(Arc::clone(&self.inner)),
            children: Mutex::new(Vec::new()),
            id,
            label,
        });

        let mut children = self.inner.children.lock().unwrap();
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Arc::downgrade(&child));

        Ok(ScopedContainer { inner: child })
    }

    /// The diagnostic label this scope was created with.
    #[inline]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// The unique id of this scope.
    #[inline]
    pub fn scope_id(&self) -> ScopeId {
        self.inner.id
    }

    /// Register an asynchronous factory for `tag` in this scope.
    ///
    /// Same policy as [`crate::Container::register`]; the registration is
    /// local to this scope and shadows any ancestor registration.
    pub fn register<T, F, Fut>(&self, tag: &Tag<T>, factory: F) -> Result<&Self>
    where
        T: Injectable,
        F: Fn(crate::ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.inner.core.register(tag.erased(), Recipe::new(factory))?;
        Ok(self)
    }

    /// Register a factory with a finalizer in this scope.
    pub fn register_with_finalizer<T, F, Fut, D, DFut>(
        &self,
        tag: &Tag<T>,
        factory: F,
        finalizer: D,
    ) -> Result<&Self>
    where
        T: Injectable,
        F: Fn(crate::ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        D: Fn(Arc<T>) -> DFut + Send + Sync + 'static,
        DFut: Future<Output = Result<()>> + Send + 'static,
    {
        let recipe = Recipe::new(factory).with_finalizer(finalizer);
        self.inner.core.register(tag.erased(), recipe)?;
        Ok(self)
    }

    /// Register an already-constructed value in this scope.
    pub fn register_instance<T: Injectable>(&self, tag: &Tag<T>, instance: T) -> Result<&Self> {
        let recipe = Recipe::from_instance(Arc::new(instance));
        self.inner.core.register(tag.erased(), recipe)?;
        Ok(self)
    }

    /// Whether `tag` is registered here or in any ancestor scope.
    pub fn has<T: Injectable>(&self, tag: &Tag<T>) -> bool {
        self.inner.has(tag.erased())
    }

    /// Whether this scope has been destroyed.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.inner.core.is_destroyed()
    }

    /// Tear down this scope and, first, all of its live children.
    ///
    /// Children are destroyed concurrently with each other, but every child
    /// finishes before this scope's own finalizers start. All failures,
    /// children's and own, are aggregated into one
    /// [`DiError::Finalization`]. Idempotent, like
    /// [`crate::Container::destroy`].
    pub async fn destroy(&self) -> Result<()> {
        let causes = Arc::clone(&self.inner).destroy_tree().await;
        if causes.is_empty() {
            Ok(())
        } else {
            Err(DiError::Finalization { causes })
        }
    }
}

impl std::fmt::Debug for ScopedContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedContainer")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("has_parent", &self.inner.parent.is_some())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl sealed::Sealed for ScopedContainer {}

impl Resolver for ScopedContainer {
    fn resolve_erased(&self, tag: ErasedTag) -> BoxFuture<'static, Result<AnyInstance>> {
        ScopedInner::resolve_scoped(&self.inner, tag, ResolutionChain::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn parent_singletons_are_shared_with_children() {
        let tag: Tag<u32> = Tag::new("app-wide");
        let runs = Arc::new(AtomicU32::new(0));

        let app = ScopedContainer::new("app");
        let counter = Arc::clone(&runs);
        app.register(&tag, move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            }
        })
        .unwrap();

        let request = app.child("request").unwrap();
        let from_request = request.resolve(&tag).await.unwrap();
        let from_app = app.resolve(&tag).await.unwrap();

        assert!(Arc::ptr_eq(&from_request, &from_app));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // The instance lives in the parent's cache, not the child's
        assert!(app.inner.core.instantiated(tag.erased()));
        assert!(!request.inner.core.instantiated(tag.erased()));
    }

    #[tokio::test]
    async fn child_overrides_never_touch_the_parent_cache() {
        let tag: Tag<u32> = Tag::new("overridden");

        let app = ScopedContainer::new("app");
        app.register(&tag, |_ctx| async { Ok(1) }).unwrap();

        let request = app.child("request").unwrap();
        request.register(&tag, |_ctx| async { Ok(2) }).unwrap();

        assert_eq!(*request.resolve(&tag).await.unwrap(), 2);
        assert!(!app.inner.core.instantiated(tag.erased()));
        assert_eq!(*app.resolve(&tag).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn has_checks_ancestors() {
        let app_tag: Tag<u32> = Tag::new("app");
        let req_tag: Tag<u32> = Tag::new("req");

        let app = ScopedContainer::new("app");
        app.register(&app_tag, |_ctx| async { Ok(1) }).unwrap();

        let request = app.child("request").unwrap();
        request.register(&req_tag, |_ctx| async { Ok(2) }).unwrap();

        assert!(request.has(&app_tag));
        assert!(request.has(&req_tag));
        assert!(app.has(&app_tag));
        assert!(!app.has(&req_tag));
    }

    #[tokio::test]
    async fn factories_in_child_scopes_see_parent_dependencies() {
        let config: Tag<u32> = Tag::new("config");
        let service: Tag<u32> = Tag::new("service");

        let app = ScopedContainer::new("app");
        app.register(&config, |_ctx| async { Ok(10) }).unwrap();

        let request = app.child("request").unwrap();
        request
            .register(&service, move |ctx| async move {
                Ok(*ctx.resolve(&config).await? + 1)
            })
            .unwrap();

        assert_eq!(*request.resolve(&service).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn children_finalize_before_the_parent() {
        let parent_tag: Tag<u32> = Tag::new("parent-svc");
        let child_tag: Tag<u32> = Tag::new("child-svc");
        let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let app = ScopedContainer::new("app");
        let log = Arc::clone(&events);
        app.register_with_finalizer(
            &parent_tag,
            |_ctx| async { Ok(1) },
            move |_instance| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push("parent");
                    Ok(())
                }
            },
        )
        .unwrap();

        let request = app.child("request").unwrap();
        let log = Arc::clone(&events);
        request
            .register_with_finalizer(
                &child_tag,
                |_ctx| async { Ok(2) },
                move |_instance| {
                    let log = Arc::clone(&log);
                    async move {
                        // Even a slow child finalizer completes before the
                        // parent's finalizers start
                        sleep(Duration::from_millis(20)).await;
                        log.lock().unwrap().push("child");
                        Ok(())
                    }
                },
            )
            .unwrap();

        app.resolve(&parent_tag).await.unwrap();
        request.resolve(&child_tag).await.unwrap();

        app.destroy().await.unwrap();

        assert_eq!(*events.lock().unwrap(), vec!["child", "parent"]);
        assert!(request.is_destroyed());
        assert!(app.is_destroyed());
    }

    #[tokio::test]
    async fn destroying_the_parent_disables_children() {
        let tag: Tag<u32> = Tag::new("svc");

        let app = ScopedContainer::new("app");
        let request = app.child("request").unwrap();
        request.register(&tag, |_ctx| async { Ok(1) }).unwrap();

        app.destroy().await.unwrap();

        assert!(matches!(
            request.resolve(&tag).await,
            Err(DiError::ContainerDestroyed)
        ));
        assert!(matches!(
            request.register(&tag, |_ctx| async { Ok(2) }),
            Err(DiError::ContainerDestroyed)
        ));
    }

    #[tokio::test]
    async fn dropped_children_are_skipped_silently() {
        let tag: Tag<u32> = Tag::new("shortlived");

        let app = ScopedContainer::new("app");
        {
            let transient = app.child("transient").unwrap();
            transient.register(&tag, |_ctx| async { Ok(1) }).unwrap();
            transient.resolve(&tag).await.unwrap();
        }
        // Handle dropped; the weak reference is dead

        app.destroy().await.unwrap();
        assert!(app.is_destroyed());
    }

    #[tokio::test]
    async fn child_destroy_is_independent_and_idempotent() {
        let child_tag: Tag<u32> = Tag::new("child-only");
        let finalized = Arc::new(AtomicU32::new(0));

        let app = ScopedContainer::new("app");
        let request = app.child("request").unwrap();
        let counter = Arc::clone(&finalized);
        request
            .register_with_finalizer(
                &child_tag,
                |_ctx| async { Ok(1) },
                move |_instance| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
            .unwrap();
        request.resolve(&child_tag).await.unwrap();

        request.destroy().await.unwrap();
        request.destroy().await.unwrap();

        assert_eq!(finalized.load(Ordering::SeqCst), 1);
        assert!(!app.is_destroyed());

        // Destroying the parent later skips the already-destroyed child
        app.destroy().await.unwrap();
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sibling_failures_aggregate_on_the_parent() {
        let left_tag: Tag<u32> = Tag::new("left-svc");
        let right_tag: Tag<u32> = Tag::new("right-svc");

        let app = ScopedContainer::new("app");
        let left = app.child("left").unwrap();
        let right = app.child("right").unwrap();

        left.register_with_finalizer(
            &left_tag,
            |_ctx| async { Ok(1) },
            |_instance| async { Err(DiError::factory_failure("left teardown")) },
        )
        .unwrap();
        right
            .register_with_finalizer(
                &right_tag,
                |_ctx| async { Ok(2) },
                |_instance| async { Err(DiError::factory_failure("right teardown")) },
            )
            .unwrap();

        left.resolve(&left_tag).await.unwrap();
        right.resolve(&right_tag).await.unwrap();

        let err = app.destroy().await.unwrap_err();
        let DiError::Finalization { causes } = &err else {
            panic!("expected finalization error, got {err}");
        };
        assert_eq!(causes.len(), 2);
        assert!(app.is_destroyed());
        assert!(left.is_destroyed());
        assert!(right.is_destroyed());
    }

    #[tokio::test]
    async fn destroyed_scope_cannot_mint_children() {
        let app = ScopedContainer::new("app");
        app.destroy().await.unwrap();

        assert!(matches!(
            app.child("orphan"),
            Err(DiError::ContainerDestroyed)
        ));
    }

    #[tokio::test]
    async fn root_scope_without_registration_reports_unknown() {
        let tag: Tag<u32> = Tag::new("nowhere");
        let app = ScopedContainer::new("app");

        assert!(matches!(
            app.resolve(&tag).await,
            Err(DiError::UnknownDependency { .. })
        ));
    }
}
