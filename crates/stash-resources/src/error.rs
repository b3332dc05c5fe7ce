//! Error types for the resource cache.
//!
//! A missing asset is not an error: the host's "not found" answer is returned
//! as `None` (or an empty group) and cached like any other value. Errors are
//! reserved for invalid arguments and for type tokens that cannot be bound to
//! a cache.

use std::any::TypeId;
use std::fmt;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The path passed to a public entry point was empty.
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// An empty type name was passed to a name lookup.
    InvalidTypeName,

    /// No asset type was registered under this token or name.
    UnregisteredType {
        /// The type ID of the asset, if known.
        type_id: Option<TypeId>,
        /// Human-readable type name if available.
        type_name: Option<String>,
    },

    /// The host refused to load this asset type.
    IneligibleType {
        /// The type ID of the asset.
        type_id: TypeId,
        /// Human-readable type name.
        type_name: &'static str,
    },

    /// An erased value did not have the requested type.
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual type ID.
        actual: TypeId,
    },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InvalidPath { path } => {
                write!(f, "Invalid asset path: '{}'", path)
            }
            CacheError::InvalidTypeName => {
                write!(f, "Asset type name must not be empty")
            }
            CacheError::UnregisteredType { type_name, .. } => {
                if let Some(name) = type_name {
                    write!(f, "Asset type is not registered with the cache: {}", name)
                } else {
                    write!(f, "Asset type is not registered with the cache")
                }
            }
            CacheError::IneligibleType { type_name, .. } => {
                write!(f, "Host cannot load asset type: {}", type_name)
            }
            CacheError::TypeMismatch { expected, .. } => {
                write!(f, "Type mismatch: expected {}", expected)
            }
        }
    }
}

impl std::error::Error for CacheError {}

impl CacheError {
    /// Whether this error is a configuration problem with a type token
    /// rather than a bad argument.
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(
            self,
            CacheError::UnregisteredType { .. } | CacheError::IneligibleType { .. }
        )
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Reject empty or whitespace-only paths.
pub(crate) fn validate_path(path: &str) -> CacheResult<()> {
    if path.trim().is_empty() {
        return Err(CacheError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("icons/a").is_ok());
        assert_eq!(
            validate_path(""),
            Err(CacheError::InvalidPath {
                path: String::new()
            })
        );
        assert!(validate_path("   ").is_err());
    }

    #[test]
    fn test_display_messages() {
        let err = CacheError::UnregisteredType {
            type_id: None,
            type_name: Some("Texture".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Asset type is not registered with the cache: Texture"
        );
        assert!(err.is_dispatch_failure());

        let err = CacheError::InvalidPath {
            path: String::new(),
        };
        assert_eq!(err.to_string(), "Invalid asset path: ''");
        assert!(!err.is_dispatch_failure());
    }
}
