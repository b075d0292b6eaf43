//! Identity and payload types for registry routing
//!
//! This module defines the key that groups connections in the registry and
//! the payload fanned out to them.

use std::borrow::Borrow;
use std::sync::Arc;

/// Opaque session identity ("auth") that ties a producer to its viewers
///
/// No validation is applied. Comparison is case-sensitive and byte-exact.
/// Cloning is a reference count bump.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Arc<str>);

impl Identity {
    /// Create a new identity
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the identity string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identity string is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A subtitle line to be delivered to every connection of an identity
///
/// Cheap to clone: all recipients share one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtitle(Arc<str>);

impl Subtitle {
    /// Create a new subtitle payload
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// The subtitle text, unmodified
    pub fn text(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_identity_is_case_sensitive() {
        assert_ne!(Identity::from("Alice"), Identity::from("alice"));
    }

    #[test]
    fn test_identity_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(Identity::from("alice@example.com"), 1);

        assert_eq!(map.get("alice@example.com"), Some(&1));
        assert_eq!(map.get("bob@example.com"), None);
    }

    #[test]
    fn test_subtitle_shares_allocation() {
        let a = Subtitle::new("Hola");
        let b = a.clone();
        assert!(std::ptr::eq(a.text(), b.text()));
    }
}
