//! Resolution contexts and the shared resolver surface
//!
//! A [`ResolutionContext`] is the capability handed to every factory: it can
//! resolve further tags (against the container the recipe was found on) and
//! nothing else: no registration, no teardown. It carries the current
//! [`ResolutionChain`] so cycle detection survives any number of `await`
//! points inside factories.

use crate::chain::ResolutionChain;
use crate::error::Result;
use crate::recipe::{AnyInstance, downcast_arc_unchecked};
use crate::tag::{ErasedTag, Injectable, Tag};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Internal resolution entry point shared by containers and scopes.
///
/// The chain parameter is what threads cycle detection through delegation
/// and through factory sub-resolution.
pub(crate) trait ErasedResolver: Send + Sync + 'static {
    fn resolve_chained(
        self: Arc<Self>,
        tag: ErasedTag,
        chain: ResolutionChain,
    ) -> BoxFuture<'static, Result<AnyInstance>>;
}

/// Anything that can resolve tags: containers, scoped containers and the
/// [`ResolutionContext`] passed into factories.
///
/// Sealed; not implementable outside this crate.
pub trait Resolver: sealed::Sealed + Send + Sync {
    /// Type-erased resolution; prefer [`Resolver::resolve`].
    #[doc(hidden)]
    fn resolve_erased(&self, tag: ErasedTag) -> BoxFuture<'static, Result<AnyInstance>>;

    /// Resolve a single tag to its singleton instance.
    fn resolve<T: Injectable>(
        &self,
        tag: &Tag<T>,
    ) -> impl Future<Output = Result<Arc<T>>> + Send {
        let fut = self.resolve_erased(tag.erased());
        async move {
            let any = fut.await?;
            // SAFETY: a tag id binds exactly one value type; see recipe.rs
            Ok(unsafe { downcast_arc_unchecked::<T>(any) })
        }
    }

    /// Resolve several tags concurrently.
    ///
    /// All resolutions are fired together and all are awaited to settlement;
    /// the output preserves input order, and the first error (in input
    /// order) fails the call only after every resolution has finished.
    fn resolve_all<L: TagTuple>(
        &self,
        tags: L,
    ) -> impl Future<Output = Result<L::Values>> + Send
    where
        Self: Sized,
    {
        tags.join_resolve(self)
    }
}

/// The resolve-only view of a container handed to factories.
///
/// Created fresh per factory invocation; scoped to that invocation. Cloning
/// is cheap and keeps the same chain, which matters only if a factory fans
/// its own sub-resolutions out across tasks.
#[derive(Clone)]
pub struct ResolutionContext {
    resolver: Arc<dyn ErasedResolver>,
    chain: ResolutionChain,
}

impl ResolutionContext {
    pub(crate) fn new(resolver: Arc<dyn ErasedResolver>, chain: ResolutionChain) -> Self {
        Self { resolver, chain }
    }

    /// The chain of tags under construction leading to this factory call.
    #[inline]
    pub fn chain(&self) -> &ResolutionChain {
        &self.chain
    }
}

impl sealed::Sealed for ResolutionContext {}

impl Resolver for ResolutionContext {
    fn resolve_erased(&self, tag: ErasedTag) -> BoxFuture<'static, Result<AnyInstance>> {
        Arc::clone(&self.resolver).resolve_chained(tag, self.chain.clone())
    }
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("chain", &self.chain)
            .finish()
    }
}

/// A tuple of tags accepted by [`Resolver::resolve_all`].
///
/// Implemented for tuples of one through eight tags.
pub trait TagTuple: sealed::Sealed + Send {
    /// Resolved values, in input order.
    type Values;

    #[doc(hidden)]
    fn join_resolve<R: Resolver + ?Sized>(
        self,
        resolver: &R,
    ) -> impl Future<Output = Result<Self::Values>> + Send;
}

impl<A: Injectable> sealed::Sealed for (Tag<A>,) {}

impl<A: Injectable> TagTuple for (Tag<A>,) {
    type Values = (Arc<A>,);

    fn join_resolve<R: Resolver + ?Sized>(
        self,
        resolver: &R,
    ) -> impl Future<Output = Result<Self::Values>> + Send {
        async move { Ok((resolver.resolve(&self.0).await?,)) }
    }
}

macro_rules! impl_tag_tuple {
    ($(($T:ident, $t:ident)),+) => {
        impl<$($T: Injectable),+> sealed::Sealed for ($(Tag<$T>,)+) {}

        impl<$($T: Injectable),+> TagTuple for ($(Tag<$T>,)+) {
            type Values = ($(Arc<$T>,)+);

            fn join_resolve<R: Resolver + ?Sized>(
                self,
                resolver: &R,
            ) -> impl Future<Output = Result<Self::Values>> + Send {
                let ($($t,)+) = self;
                async move {
                    let ($($t,)+) = futures::join!($(resolver.resolve(&$t)),+);
                    Ok(($($t?,)+))
                }
            }
        }
    };
}

impl_tag_tuple!((A, a), (B, b));
impl_tag_tuple!((A, a), (B, b), (C, c));
impl_tag_tuple!((A, a), (B, b), (C, c), (D, d));
impl_tag_tuple!((A, a), (B, b), (C, c), (D, d), (E, e));
impl_tag_tuple!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f));
impl_tag_tuple!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f), (G, g));
impl_tag_tuple!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f), (G, g), (H, h));
