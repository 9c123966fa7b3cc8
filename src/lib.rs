//! # plexus-di - Asynchronous dependency injection for Rust
//!
//! A runtime dependency-injection engine: a registry of lazily-created,
//! singleton instances resolved asynchronously, with cycle detection,
//! deterministic teardown, parent/child scoping and a composition algebra
//! for assembling object graphs from reusable layers.
//!
//! ## Features
//!
//! - **Lazy async singletons** - factories are `async`, run at most once per
//!   tag, and only when first resolved
//! - **At-most-once under concurrency** - the in-flight construction is the
//!   cache entry; concurrent resolvers of one tag share a single factory run
//! - **Cycle detection across `await` points** - resolution chains travel
//!   with the logical call, so unrelated concurrent resolutions never
//!   interfere
//! - **Deterministic teardown** - finalizers run concurrently for
//!   instantiated dependencies only, failures aggregated, `destroy`
//!   idempotent
//! - **Scoped container trees** - children delegate resolution upward and
//!   are torn down before their parent
//! - **Layer algebra** - sequential and parallel composition of
//!   registration bundles, applied lazily
//! - **Observable** - optional `tracing` integration with JSON or pretty
//!   output
//!
//! ## Quick start
//!
//! ```rust
//! use plexus_di::{Container, Resolver, Tag};
//!
//! #[derive(Debug)]
//! struct Database {
//!     url: String,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> plexus_di::Result<()> {
//! let url: Tag<String> = Tag::new("db.url");
//! let db: Tag<Database> = Tag::new("db");
//!
//! let container = Container::new();
//! container
//!     .register(&url, |_ctx| async { Ok("postgres://localhost".to_string()) })?
//!     .register(&db, move |ctx| async move {
//!         let url = ctx.resolve(&url).await?;
//!         Ok(Database { url: url.as_str().to_owned() })
//!     })?;
//!
//! // Lazy: nothing has been constructed yet
//! let database = container.resolve(&db).await?;
//! assert_eq!(database.url, "postgres://localhost");
//!
//! container.destroy().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Scopes
//!
//! ```rust
//! use plexus_di::{Resolver, ScopedContainer, Tag};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> plexus_di::Result<()> {
//! let config: Tag<u32> = Tag::new("config");
//! let request_id: Tag<String> = Tag::new("request.id");
//!
//! let app = ScopedContainer::new("application");
//! app.register(&config, |_ctx| async { Ok(10) })?;
//!
//! let request = app.child("request")?;
//! request.register_instance(&request_id, "req-1".to_string())?;
//!
//! // Children resolve parent registrations; parents never see child ones
//! assert!(request.has(&config));
//! assert!(!app.has(&request_id));
//!
//! // Destroys the request scope first, then the application scope
//! app.destroy().await?;
//! # Ok(())
//! # }
//! ```

mod chain;
mod container;
mod context;
mod error;
mod layer;
#[cfg(feature = "logging")]
pub mod logging;
mod recipe;
mod scope;
mod tag;

pub use chain::ResolutionChain;
pub use container::Container;
pub use context::{ResolutionContext, Resolver, TagTuple};
pub use error::{DiError, Result};
pub use layer::{Layer, LayerBuilder};
pub use recipe::AnyInstance;
pub use scope::{ScopeId, ScopedContainer};
pub use tag::{ErasedTag, Injectable, Tag};
