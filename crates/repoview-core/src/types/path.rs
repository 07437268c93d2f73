//! # Repository Paths
//!
//! A path is a sequence of child-edge names, optionally absolute (rooted at the
//! store root), and may contain `.` and `..` steps when it is relative.
//! Same-name siblings are told apart with a 1-based `[n]` index.
//!
//! Text form uses prefixed names with ISO 9075 escaping of the local part:
//! `/cm:company_x0020_home/cm:docs[2]`, `../cm:other`.

use super::{QName, Result, ViewError};
use crate::iso9075;
use crate::namespace::NamespaceRegistry;

/// One step of a repository path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathElement {
    /// Descend into the child edge with this name (`[n]` picks a same-name sibling).
    Child { name: QName, index: Option<usize> },
    /// `..`
    Parent,
    /// `.`
    Current,
}

impl PathElement {
    /// A child step without a sibling index.
    #[must_use]
    pub fn child(name: QName) -> Self {
        Self::Child { name, index: None }
    }

    fn matches(&self, other: &PathElement) -> bool {
        match (self, other) {
            (
                Self::Child { name: a, index: ia },
                Self::Child { name: b, index: ib },
            ) => a == b && (ia.is_none() || ib.is_none() || ia == ib),
            (a, b) => a == b,
        }
    }
}

/// An absolute or relative path through primary child edges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RepoPath {
    absolute: bool,
    elements: Vec<PathElement>,
}

impl RepoPath {
    /// The store root, `/`.
    #[must_use]
    pub fn root() -> Self {
        Self {
            absolute: true,
            elements: Vec::new(),
        }
    }

    /// An absolute path from the given steps.
    #[must_use]
    pub fn absolute(elements: Vec<PathElement>) -> Self {
        Self {
            absolute: true,
            elements,
        }
    }

    /// A relative path from the given steps.
    #[must_use]
    pub fn relative(elements: Vec<PathElement>) -> Self {
        Self {
            absolute: false,
            elements,
        }
    }

    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    #[must_use]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// True for `/`.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.absolute && self.elements.is_empty()
    }

    /// Append a step.
    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    /// Whether one path is an ancestor-or-self of the other, in either direction.
    ///
    /// Sibling indices only have to agree where both paths carry one.
    #[must_use]
    pub fn overlaps(&self, other: &RepoPath) -> bool {
        self.elements
            .iter()
            .zip(other.elements.iter())
            .all(|(a, b)| a.matches(b))
    }

    /// Render with namespace prefixes.
    pub fn to_prefixed_string(&self, namespaces: &NamespaceRegistry) -> Result<String> {
        let mut parts = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            parts.push(match element {
                PathElement::Parent => "..".to_string(),
                PathElement::Current => ".".to_string(),
                PathElement::Child { name, index } => {
                    let prefix = namespaces.prefix(name.namespace_uri()).ok_or_else(|| {
                        ViewError::UnknownDefinition(format!(
                            "Namespace URI {} has not been defined",
                            name.namespace_uri()
                        ))
                    })?;
                    let local = iso9075::encode(name.local_name());
                    match index {
                        Some(i) => format!("{}:{}[{}]", prefix, local, i),
                        None => format!("{}:{}", prefix, local),
                    }
                }
            });
        }
        let joined = parts.join("/");
        Ok(match (self.absolute, joined.is_empty()) {
            (true, _) => format!("/{}", joined),
            (false, true) => ".".to_string(),
            (false, false) => joined,
        })
    }

    /// Parse the prefixed text form.
    pub fn parse(text: &str, namespaces: &NamespaceRegistry) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ViewError::MalformedValue("Empty path".to_string()));
        }
        let mut path = Self {
            absolute: text.starts_with('/'),
            elements: Vec::new(),
        };
        for segment in text.split('/').filter(|s| !s.is_empty()) {
            path.elements.push(match segment {
                "." => PathElement::Current,
                ".." => PathElement::Parent,
                _ => parse_step(segment, namespaces)?,
            });
        }
        Ok(path)
    }
}

fn parse_step(segment: &str, namespaces: &NamespaceRegistry) -> Result<PathElement> {
    let (name, index) = match segment.strip_suffix(']').and_then(|s| s.split_once('[')) {
        Some((name, index)) => {
            let index: usize = index.parse().map_err(|_| {
                ViewError::MalformedValue(format!("Invalid sibling index in '{}'", segment))
            })?;
            if index == 0 {
                return Err(ViewError::MalformedValue(format!(
                    "Sibling indices are 1-based in '{}'",
                    segment
                )));
            }
            (name, Some(index))
        }
        None => (segment, None),
    };
    let name = namespaces.resolve_prefixed(name)?;
    let name = QName::new(name.namespace_uri(), iso9075::decode(name.local_name()));
    Ok(PathElement::Child { name, index })
}

// =============================================================================
// TESTS
// =============================================================================
