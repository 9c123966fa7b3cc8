//! Tags: opaque identities naming resolvable dependencies
//!
//! A [`Tag`] is minted once by the caller, carries the value type as a
//! phantom parameter, and is used purely as a map key by the container.
//! Two tags with the same label are still distinct identities.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Marker trait for values that can live in a container.
///
/// Automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// A typed dependency identity.
///
/// Each call to [`Tag::new`] mints a process-unique id, so two tags never
/// collide even when they share a label or a value type. The tag is `Copy`
/// and cheap to pass around; containers never take ownership of it.
///
/// # Examples
///
/// ```rust
/// use plexus_di::Tag;
///
/// let port: Tag<u16> = Tag::new("http.port");
/// let other: Tag<u16> = Tag::new("http.port");
///
/// // Same label, distinct identities
/// assert_ne!(port, other);
/// assert_eq!(port.label(), "http.port");
/// ```
pub struct Tag<T: ?Sized> {
    id: u64,
    label: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized> Tag<T> {
    /// Mint a new tag with a human-readable label.
    ///
    /// The label is used for diagnostics only; identity comes from the
    /// internal counter.
    pub fn new(label: &'static str) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            label,
            _marker: PhantomData,
        }
    }

    /// The diagnostic label this tag was minted with.
    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// The unique id backing this tag's identity.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Erase the value type, keeping only the identity.
    #[inline]
    pub fn erased(&self) -> ErasedTag {
        ErasedTag {
            id: self.id,
            label: self.label,
        }
    }
}

// Manual impls: derives would bound on T, but the tag is a plain handle.
impl<T: ?Sized> Clone for Tag<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Tag<T> {}

impl<T: ?Sized> PartialEq for Tag<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: ?Sized> Eq for Tag<T> {}

impl<T: ?Sized> std::hash::Hash for Tag<T> {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

impl<T: ?Sized> fmt::Display for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// A type-erased tag identity.
///
/// Used as the key in registry and cache maps, in resolution chains and in
/// error values. Identity is the id alone; the label rides along for
/// diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct ErasedTag {
    id: u64,
    label: &'static str,
}

impl ErasedTag {
    /// The unique id of the originating tag.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The diagnostic label of the originating tag.
    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl PartialEq for ErasedTag {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ErasedTag {}

impl std::hash::Hash for ErasedTag {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ErasedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_unique_identities() {
        let a: Tag<u32> = Tag::new("value");
        let b: Tag<u32> = Tag::new("value");

        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a);
    }

    #[test]
    fn copies_share_identity() {
        let a: Tag<String> = Tag::new("name");
        let b = a;

        assert_eq!(a, b);
        assert_eq!(a.erased(), b.erased());
    }

    #[test]
    fn erased_equality_ignores_label() {
        let a: Tag<u32> = Tag::new("one");
        let erased = a.erased();

        assert_eq!(erased.id(), a.id());
        assert_eq!(erased.label(), "one");
        assert_eq!(erased, a.erased());
    }

    #[test]
    fn display_uses_label() {
        let a: Tag<u32> = Tag::new("db.pool");
        assert_eq!(a.to_string(), "db.pool");
        assert_eq!(a.erased().to_string(), "db.pool");
    }
}
