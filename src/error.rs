//! Error types for dependency resolution and teardown

use crate::chain::ResolutionChain;
use crate::tag::ErasedTag;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during registration, resolution or teardown.
///
/// The type is `Clone` because a failed construction is broadcast to every
/// caller awaiting the same in-flight cache entry.
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// Resolve was requested for a tag with no registration
    #[error("unknown dependency: {tag}")]
    UnknownDependency { tag: ErasedTag },

    /// A resolution chain looped back onto a tag already under construction
    #[error("circular dependency detected for '{tag}': {chain}")]
    CircularDependency {
        tag: ErasedTag,
        chain: ResolutionChain,
    },

    /// A factory failed, or one of its transitive dependencies failed.
    ///
    /// Wraps the original cause exactly once per resolution hop, forming a
    /// diagnostic chain from the outermost resolve down to the root failure.
    #[error("failed to create dependency '{tag}': {cause}")]
    DependencyCreation { tag: ErasedTag, cause: Arc<DiError> },

    /// A factory reported a domain failure of its own
    #[error("factory failed: {reason}")]
    FactoryFailure { reason: String },

    /// Re-registration was attempted for a tag that already has a live
    /// (in-flight or settled) instance
    #[error("dependency already instantiated: {tag}")]
    AlreadyInstantiated { tag: ErasedTag },

    /// Operation attempted on a destroyed container
    #[error("container is destroyed")]
    ContainerDestroyed,

    /// One or more finalizers failed during teardown
    #[error("finalization failed for {} dependenc{}", causes.len(), if causes.len() == 1 { "y" } else { "ies" })]
    Finalization { causes: Vec<(ErasedTag, DiError)> },
}

impl DiError {
    /// Create a `FactoryFailure` from any displayable reason.
    #[inline]
    pub fn factory_failure(reason: impl Into<String>) -> Self {
        Self::FactoryFailure {
            reason: reason.into(),
        }
    }

    /// Wrap a failure that occurred while constructing `tag`.
    #[inline]
    pub(crate) fn creation(tag: ErasedTag, cause: DiError) -> Self {
        Self::DependencyCreation {
            tag,
            cause: Arc::new(cause),
        }
    }

    /// The wrapped cause, when this is a `DependencyCreation` error.
    pub fn cause(&self) -> Option<&DiError> {
        match self {
            Self::DependencyCreation { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Walk the `DependencyCreation` chain down to the innermost failure.
    pub fn root_cause(&self) -> &DiError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;

    #[test]
    fn creation_errors_chain_to_root_cause() {
        let a: Tag<u32> = Tag::new("a");
        let b: Tag<u32> = Tag::new("b");

        let root = DiError::UnknownDependency { tag: b.erased() };
        let wrapped = DiError::creation(a.erased(), root);

        assert!(matches!(
            wrapped.root_cause(),
            DiError::UnknownDependency { .. }
        ));
        assert!(wrapped.cause().is_some());
        assert!(
            wrapped
                .to_string()
                .contains("failed to create dependency 'a'")
        );
    }

    #[test]
    fn finalization_display_counts_causes() {
        let a: Tag<u32> = Tag::new("a");
        let err = DiError::Finalization {
            causes: vec![(a.erased(), DiError::factory_failure("boom"))],
        };
        assert_eq!(err.to_string(), "finalization failed for 1 dependency");
    }

    #[test]
    fn factory_failure_keeps_reason() {
        let err = DiError::factory_failure("connection refused");
        assert!(err.to_string().contains("connection refused"));
        assert!(err.cause().is_none());
        assert!(matches!(err.root_cause(), DiError::FactoryFailure { .. }));
    }
}
