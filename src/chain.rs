//! Resolution chains for cycle detection
//!
//! A chain is the ordered list of tags under construction along one logical
//! resolution call. It travels with the call (cloned and extended per hop),
//! never lives on the container, so unrelated concurrent resolutions cannot
//! corrupt each other's cycle detection.

use crate::tag::ErasedTag;
use std::fmt;

/// The ordered list of tags currently being constructed on one call path.
///
/// Chains are short (bounded by graph depth), so extension clones the
/// backing vector rather than sharing nodes.
#[derive(Clone, Debug, Default)]
pub struct ResolutionChain {
    tags: Vec<ErasedTag>,
}

impl ResolutionChain {
    /// An empty chain, used at the top of every external `resolve` call.
    #[inline]
    pub(crate) fn empty() -> Self {
        Self { tags: Vec::new() }
    }

    /// Whether `tag` is already under construction on this path.
    #[inline]
    pub(crate) fn contains(&self, tag: ErasedTag) -> bool {
        self.tags.contains(&tag)
    }

    /// A new chain with `tag` appended; the receiver is left untouched.
    pub(crate) fn extended(&self, tag: ErasedTag) -> Self {
        let mut tags = Vec::with_capacity(self.tags.len() + 1);
        tags.extend_from_slice(&self.tags);
        tags.push(tag);
        Self { tags }
    }

    /// The tags on this chain, outermost first.
    #[inline]
    pub fn tags(&self) -> &[ErasedTag] {
        &self.tags
    }

    /// Number of tags on the chain.
    #[inline]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the chain is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl fmt::Display for ResolutionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for tag in &self.tags {
            if !first {
                write!(f, " -> ")?;
            }
            write!(f, "{tag}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;

    #[test]
    fn extension_leaves_original_untouched() {
        let a: Tag<u32> = Tag::new("a");
        let b: Tag<u32> = Tag::new("b");

        let empty = ResolutionChain::empty();
        let one = empty.extended(a.erased());
        let two = one.extended(b.erased());

        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert_eq!(two.len(), 2);
        assert!(one.contains(a.erased()));
        assert!(!one.contains(b.erased()));
        assert!(two.contains(b.erased()));
    }

    #[test]
    fn display_joins_with_arrows() {
        let a: Tag<u32> = Tag::new("a");
        let b: Tag<u32> = Tag::new("b");

        let chain = ResolutionChain::empty()
            .extended(a.erased())
            .extended(b.erased())
            .extended(a.erased());

        assert_eq!(chain.to_string(), "a -> b -> a");
    }
}
