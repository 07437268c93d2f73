//! # Namespace Registry
//!
//! Bidirectional prefix ↔ URI map used to render qualified names as
//! `prefix:local` and to resolve them back. The view namespace is always
//! registered under the `view` prefix.

use crate::primitives::{VIEW_NAMESPACE_URI, VIEW_PREFIX};
use crate::types::{QName, Result, ViewError};
use std::collections::BTreeMap;

/// Known namespace prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRegistry {
    by_prefix: BTreeMap<String, String>,
    by_uri: BTreeMap<String, String>,
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceRegistry {
    /// A registry holding only the view namespace.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            by_prefix: BTreeMap::new(),
            by_uri: BTreeMap::new(),
        };
        registry.register(VIEW_PREFIX, VIEW_NAMESPACE_URI);
        registry
    }

    /// Register (or re-map) a prefix.
    pub fn register(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        if let Some(old_uri) = self.by_prefix.insert(prefix.clone(), uri.clone()) {
            self.by_uri.remove(&old_uri);
        }
        self.by_uri.insert(uri, prefix);
    }

    /// URI bound to a prefix.
    #[must_use]
    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(String::as_str)
    }

    /// Prefix bound to a URI.
    #[must_use]
    pub fn prefix(&self, uri: &str) -> Option<&str> {
        self.by_uri.get(uri).map(String::as_str)
    }

    /// Whether the URI is known.
    #[must_use]
    pub fn contains_uri(&self, uri: &str) -> bool {
        self.by_uri.contains_key(uri)
    }

    /// All `(prefix, uri)` pairs in prefix order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_prefix
            .iter()
            .map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Render `prefix:local`.
    pub fn to_prefixed(&self, name: &QName) -> Result<String> {
        let prefix = self.prefix(name.namespace_uri()).ok_or_else(|| {
            ViewError::UnknownDefinition(format!(
                "Namespace URI {} has not been defined",
                name.namespace_uri()
            ))
        })?;
        Ok(format!("{}:{}", prefix, name.local_name()))
    }

    /// Resolve `prefix:local` or the canonical `{uri}local` form.
    pub fn resolve_prefixed(&self, text: &str) -> Result<QName> {
        let text = text.trim();
        if text.starts_with('{') {
            return text.parse();
        }
        let (prefix, local) = text.split_once(':').ok_or_else(|| {
            ViewError::MalformedValue(format!("'{}' is not a prefixed name", text))
        })?;
        let uri = self.uri(prefix).ok_or_else(|| {
            ViewError::UnknownDefinition(format!("Namespace prefix {} has not been defined", prefix))
        })?;
        if local.is_empty() {
            return Err(ViewError::MalformedValue(format!(
                "'{}' has an empty local name",
                text
            )));
        }
        Ok(QName::new(uri, local))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn view_prefix_is_preregistered() {
        let ns = NamespaceRegistry::new();
        assert_eq!(ns.uri("view"), Some(VIEW_NAMESPACE_URI));
        assert!(ns.contains_uri(VIEW_NAMESPACE_URI));
    }

    #[test]
    fn prefixed_names_roundtrip() {
        let mut ns = NamespaceRegistry::new();
        ns.register("cm", "urn:cm");
        let name = QName::new("urn:cm", "folder");
        let text = ns.to_prefixed(&name).unwrap();
        assert_eq!(text, "cm:folder");
        assert_eq!(ns.resolve_prefixed(&text).unwrap(), name);
        assert_eq!(ns.resolve_prefixed("{urn:cm}folder").unwrap(), name);
    }

    #[test]
    fn remapping_a_prefix_forgets_the_old_uri() {
        let mut ns = NamespaceRegistry::new();
        ns.register("cm", "urn:old");
        ns.register("cm", "urn:new");
        assert!(!ns.contains_uri("urn:old"));
        assert_eq!(ns.prefix("urn:new"), Some("cm"));
    }

    #[test]
    fn unknown_names_are_errors() {
        let ns = NamespaceRegistry::new();
        assert!(matches!(
            ns.resolve_prefixed("zz:x"),
            Err(ViewError::UnknownDefinition(_))
        ));
        assert!(ns.to_prefixed(&QName::new("urn:nowhere", "x")).is_err());
        assert!(ns.resolve_prefixed("bare").is_err());
    }
}
