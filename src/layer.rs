//! Layers: composable bundles of registrations
//!
//! A [`Layer`] is a pure value describing a set of registrations together
//! with the tags it requires from elsewhere and the tags it provides. Layers
//! compose sequentially ([`Layer::to`], [`Layer::to_merged`]) and in
//! parallel ([`Layer::merge`]) into one value that is finally applied to a
//! container with [`Layer::register`], the only side-effecting operation.
//! Nothing is instantiated by composition or registration; resolution stays
//! lazy no matter how many layers built the registry.
//!
//! The requires/provides sets are advisory bookkeeping for the author; the
//! runtime performs no ahead-of-use graph validation, and an unsatisfied
//! requirement surfaces as `UnknownDependency` at resolve time.

use crate::container::Container;
use crate::error::Result;
use crate::tag::{ErasedTag, Tag};
use std::collections::HashSet;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

type RegisterFn = Arc<dyn Fn(&Container) -> Result<()> + Send + Sync>;

/// A composable, side-effect-free description of registrations.
///
/// Cloning is cheap; composition never mutates its operands.
///
/// # Examples
///
/// ```rust
/// use plexus_di::{Container, Layer, Resolver, Tag};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> plexus_di::Result<()> {
/// let url: Tag<String> = Tag::new("db.url");
/// let pool: Tag<String> = Tag::new("db.pool");
///
/// let config = Layer::builder("config")
///     .provides(&url)
///     .build(move |c| {
///         c.register(&url, |_ctx| async { Ok("postgres://localhost".to_string()) })?;
///         Ok(())
///     });
///
/// let database = Layer::builder("database")
///     .requires(&url)
///     .provides(&pool)
///     .build(move |c| {
///         c.register(&pool, move |ctx| async move {
///             let url = ctx.resolve(&url).await?;
///             Ok(format!("pool({url})"))
///         })?;
///         Ok(())
///     });
///
/// let container = Container::new();
/// config.to(&database).register(&container)?;
///
/// assert_eq!(*container.resolve(&pool).await?, "pool(postgres://localhost)");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Layer {
    label: String,
    requires: HashSet<ErasedTag>,
    provides: HashSet<ErasedTag>,
    register_fn: RegisterFn,
}

impl Layer {
    /// Start building a layer with a diagnostic label.
    pub fn builder(label: impl Into<String>) -> LayerBuilder {
        LayerBuilder {
            label: label.into(),
            requires: HashSet::new(),
            provides: HashSet::new(),
        }
    }

    /// The diagnostic label of this layer.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Tags this layer needs registered elsewhere.
    #[inline]
    pub fn requires(&self) -> &HashSet<ErasedTag> {
        &self.requires
    }

    /// Tags this layer registers.
    #[inline]
    pub fn provides(&self) -> &HashSet<ErasedTag> {
        &self.provides
    }

    /// Apply this layer's registrations to a container.
    ///
    /// The only side-effecting layer operation. Subject to the container's
    /// registration policy: applying a layer twice fails once any of its
    /// tags has been instantiated.
    pub fn register(&self, container: &Container) -> Result<()> {
        #[cfg(feature = "logging")]
        debug!(
            target: "plexus_di",
            layer = %self.label,
            provides = self.provides.len(),
            "Applying layer"
        );

        (self.register_fn)(container)
    }

    /// Sequential composition: feed this layer's provisions to `consumer`.
    ///
    /// The provider registers first, so the consumer's factories can resolve
    /// everything the provider supplies. The result requires the provider's
    /// requirements plus whatever the consumer needs beyond the provider's
    /// provisions, and it provides **only** the consumer's provisions; the
    /// provider's are treated as hidden intermediates (though they remain
    /// resolvable on the target container). Use [`Layer::to_merged`] to
    /// expose them.
    pub fn to(&self, consumer: &Layer) -> Layer {
        self.sequential(consumer, false)
    }

    /// Sequential composition that also exposes this layer's provisions.
    ///
    /// Identical registration behavior to [`Layer::to`]; only the advertised
    /// provides-set differs.
    pub fn to_merged(&self, consumer: &Layer) -> Layer {
        self.sequential(consumer, true)
    }

    fn sequential(&self, consumer: &Layer, expose_intermediates: bool) -> Layer {
        let mut requires = self.requires.clone();
        requires.extend(consumer.requires.difference(&self.provides).copied());

        let mut provides = consumer.provides.clone();
        if expose_intermediates {
            provides.extend(self.provides.iter().copied());
        }

        let provider_fn = Arc::clone(&self.register_fn);
        let consumer_fn = Arc::clone(&consumer.register_fn);
        Layer {
            label: format!("{} -> {}", self.label, consumer.label),
            requires,
            provides,
            register_fn: Arc::new(move |container| {
                provider_fn(container)?;
                consumer_fn(container)
            }),
        }
    }

    /// Parallel composition of two independent layers.
    ///
    /// Registration order between the two must not matter: their tags should
    /// be disjoint (overlaps follow the container's overwrite policy, with
    /// `other` registering second). Requires and provides are unions.
    pub fn merge(&self, other: &Layer) -> Layer {
        let mut requires = self.requires.clone();
        requires.extend(other.requires.iter().copied());

        let mut provides = self.provides.clone();
        provides.extend(other.provides.iter().copied());

        let left_fn = Arc::clone(&self.register_fn);
        let right_fn = Arc::clone(&other.register_fn);
        Layer {
            label: format!("{} + {}", self.label, other.label),
            requires,
            provides,
            register_fn: Arc::new(move |container| {
                left_fn(container)?;
                right_fn(container)
            }),
        }
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("label", &self.label)
            .field("requires", &self.requires)
            .field("provides", &self.provides)
            .finish()
    }
}

/// Builder collecting a layer's declared tags before its registration
/// closure is attached.
pub struct LayerBuilder {
    label: String,
    requires: HashSet<ErasedTag>,
    provides: HashSet<ErasedTag>,
}

impl LayerBuilder {
    /// Declare a tag this layer expects another layer (or the caller) to
    /// register.
    pub fn requires<T>(mut self, tag: &Tag<T>) -> Self {
        self.requires.insert(tag.erased());
        self
    }

    /// Declare a tag this layer registers.
    pub fn provides<T>(mut self, tag: &Tag<T>) -> Self {
        self.provides.insert(tag.erased());
        self
    }

    /// Attach the registration closure and finish the layer.
    pub fn build<F>(self, register: F) -> Layer
    where
        F: Fn(&Container) -> Result<()> + Send + Sync + 'static,
    {
        Layer {
            label: self.label,
            requires: self.requires,
            provides: self.provides,
            register_fn: Arc::new(register),
        }
    }
}
