//! Recipes: type-erased factories and finalizers
//!
//! A recipe is what the registry stores per tag: how to build the value
//! (asynchronously, with access to a resolution context) and, optionally,
//! how to tear the built instance down.

use crate::context::ResolutionContext;
use crate::error::Result;
use crate::tag::Injectable;
use futures::future::BoxFuture;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

/// A type-erased, shareable service instance.
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

/// Type-erased asynchronous factory function
pub(crate) type AnyFactory =
    Arc<dyn Fn(ResolutionContext) -> BoxFuture<'static, Result<AnyInstance>> + Send + Sync>;

/// Type-erased asynchronous finalizer function
pub(crate) type AnyFinalizer =
    Arc<dyn Fn(AnyInstance) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Construction recipe stored in the registry under one tag.
///
/// Immutable once stored; re-registration replaces the whole recipe
/// (subject to the container's instantiation check).
#[derive(Clone)]
pub(crate) struct Recipe {
    pub(crate) factory: AnyFactory,
    pub(crate) finalizer: Option<AnyFinalizer>,
}

impl Recipe {
    /// Build a recipe from a typed async factory.
    pub(crate) fn new<T, F, Fut>(factory: F) -> Self
    where
        T: Injectable,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let factory: AnyFactory = Arc::new(move |ctx| {
            let fut = factory(ctx);
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as AnyInstance) })
        });
        Self {
            factory,
            finalizer: None,
        }
    }

    /// Build a recipe that hands out an already-constructed instance.
    pub(crate) fn from_instance<T: Injectable>(instance: Arc<T>) -> Self {
        let erased: AnyInstance = instance;
        let factory: AnyFactory = Arc::new(move |_ctx| {
            let instance = Arc::clone(&erased);
            Box::pin(async move { Ok(instance) })
        });
        Self {
            factory,
            finalizer: None,
        }
    }

    /// Attach a typed async finalizer to this recipe.
    pub(crate) fn with_finalizer<T, D, Fut>(mut self, finalizer: D) -> Self
    where
        T: Injectable,
        D: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let erased: AnyFinalizer = Arc::new(move |instance| {
            // SAFETY: the finalizer is stored under the same tag as the
            // factory that produced `instance`, and a tag id binds exactly
            // one value type for the life of the process.
            let typed = unsafe { downcast_arc_unchecked::<T>(instance) };
            Box::pin(finalizer(typed))
        });
        self.finalizer = Some(erased);
        self
    }
}

/// Downcast an `Arc<dyn Any + Send + Sync>` to `Arc<T>` without a runtime
/// type check.
///
/// # Safety
///
/// The caller must guarantee the `Arc` was created from a value of type `T`.
///
/// In this crate that holds because:
/// - every tag id is minted exactly once, by a `Tag<T>` with a fixed `T`
/// - registration erases a factory producing that `T` under the tag id
/// - resolution looks the instance up by the same tag id
#[inline]
pub(crate) unsafe fn downcast_arc_unchecked<T: Send + Sync + 'static>(
    arc: AnyInstance,
) -> Arc<T> {
    let ptr = Arc::into_raw(arc);
    // SAFETY: ptr came from Arc::into_raw and the caller guarantees T
    unsafe { Arc::from_raw(ptr as *const T) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_roundtrip() {
        let value: Arc<String> = Arc::new("hello".to_string());
        let erased: AnyInstance = value.clone();

        let back = unsafe { downcast_arc_unchecked::<String>(erased) };
        assert!(Arc::ptr_eq(&value, &back));
        assert_eq!(*back, "hello");
    }
}
