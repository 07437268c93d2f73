//! # Property Values
//!
//! Datatypes and the values a node property can hold.
//!
//! A property is either null, a single scalar, an ordered collection of
//! (possibly null) scalars, or a multilingual text map keyed by locale.
//! Every scalar has a canonical text form used on the wire; `DataType::coerce`
//! turns that text back into a typed scalar on import.

use super::{NodeRef, QName, Result, ViewError};
use crate::primitives::DICTIONARY_MODEL_URI;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Multilingual text: locale → text, where a locale may hold an explicit null.
pub type MlText = BTreeMap<String, Option<String>>;

// =============================================================================
// DATATYPES
// =============================================================================

/// A property datatype, named by a `d:` qualified name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    Any,
    Text,
    MlText,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    DateTime,
    NodeRef,
    Category,
    QName,
    Locale,
    Content,
}

impl DataType {
    /// All datatypes in declaration order.
    pub const ALL: [DataType; 15] = [
        Self::Any,
        Self::Text,
        Self::MlText,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
        Self::Boolean,
        Self::Date,
        Self::DateTime,
        Self::NodeRef,
        Self::Category,
        Self::QName,
        Self::Locale,
        Self::Content,
    ];

    /// Local part of the datatype's qualified name.
    #[must_use]
    pub const fn local_name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Text => "text",
            Self::MlText => "mltext",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::NodeRef => "noderef",
            Self::Category => "category",
            Self::QName => "qname",
            Self::Locale => "locale",
            Self::Content => "content",
        }
    }

    /// The datatype's qualified name in the dictionary model namespace.
    #[must_use]
    pub fn qname(self) -> QName {
        QName::new(DICTIONARY_MODEL_URI, self.local_name())
    }

    /// Look up a datatype by qualified name.
    #[must_use]
    pub fn from_qname(name: &QName) -> Option<Self> {
        if name.namespace_uri() != DICTIONARY_MODEL_URI {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|t| t.local_name() == name.local_name())
    }

    /// Whether values of this type are node references that must be bound
    /// after the nodes they point at exist.
    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::NodeRef | Self::Category)
    }

    /// Whether a scalar can be written as a value of this type.
    #[must_use]
    pub fn accepts(self, value: &Scalar) -> bool {
        match self {
            Self::Any | Self::Text | Self::MlText => true,
            Self::Int | Self::Long => matches!(value, Scalar::Long(_)),
            Self::Float | Self::Double => matches!(value, Scalar::Double(_) | Scalar::Long(_)),
            Self::Boolean => matches!(value, Scalar::Boolean(_)),
            Self::Date | Self::DateTime => matches!(value, Scalar::DateTime(_)),
            Self::NodeRef | Self::Category => matches!(value, Scalar::NodeRef(_)),
            Self::QName => matches!(value, Scalar::QName(_)),
            Self::Locale => matches!(value, Scalar::Locale(_) | Scalar::Text(_)),
            Self::Content => matches!(value, Scalar::Content(_)),
        }
    }

    /// Convert wire text into a typed scalar.
    pub fn coerce(self, text: &str) -> Result<Scalar> {
        let malformed = |reason: &dyn fmt::Display| {
            ViewError::MalformedValue(format!(
                "'{}' is not a valid {} value: {}",
                text,
                self.local_name(),
                reason
            ))
        };
        Ok(match self {
            Self::Any | Self::Text | Self::MlText => Scalar::Text(text.to_string()),
            Self::Int => Scalar::Long(
                text.trim()
                    .parse::<i32>()
                    .map(i64::from)
                    .map_err(|e| malformed(&e))?,
            ),
            Self::Long => Scalar::Long(text.trim().parse().map_err(|e| malformed(&e))?),
            Self::Float | Self::Double => {
                Scalar::Double(text.trim().parse().map_err(|e| malformed(&e))?)
            }
            Self::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Scalar::Boolean(true),
                "false" => Scalar::Boolean(false),
                _ => return Err(malformed(&"expected true or false")),
            },
            Self::Date | Self::DateTime => {
                if text.trim().is_empty() {
                    return Err(malformed(&"empty date"));
                }
                Scalar::DateTime(text.trim().to_string())
            }
            Self::NodeRef | Self::Category => Scalar::NodeRef(text.trim().parse()?),
            Self::QName => Scalar::QName(text.trim().parse()?),
            Self::Locale => Scalar::Locale(text.trim().to_string()),
            Self::Content => Scalar::Content(text.parse()?),
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d:{}", self.local_name())
    }
}

// =============================================================================
// SCALARS
// =============================================================================

/// A single typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    /// ISO 8601 date or date-time, kept as written.
    DateTime(String),
    NodeRef(NodeRef),
    QName(QName),
    Locale(String),
    Content(ContentData),
}

impl Scalar {
    /// The datatype a scalar of this shape naturally has.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Text(_) => DataType::Text,
            Self::Long(_) => DataType::Long,
            Self::Double(_) => DataType::Double,
            Self::Boolean(_) => DataType::Boolean,
            Self::DateTime(_) => DataType::DateTime,
            Self::NodeRef(_) => DataType::NodeRef,
            Self::QName(_) => DataType::QName,
            Self::Locale(_) => DataType::Locale,
            Self::Content(_) => DataType::Content,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::DateTime(s) | Self::Locale(s) => f.write_str(s),
            Self::Long(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::NodeRef(n) => write!(f, "{}", n),
            Self::QName(q) => write!(f, "{}", q),
            Self::Content(c) => write!(f, "{}", c),
        }
    }
}

// =============================================================================
// PROPERTY VALUES
// =============================================================================

/// The value of one node property.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropertyValue {
    #[default]
    Null,
    Single(Scalar),
    /// Ordered values; individual entries may be null.
    Collection(Vec<Option<Scalar>>),
    MlText(MlText),
}

impl PropertyValue {
    /// Shorthand for a single text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Single(Scalar::Text(s.into()))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The first scalar held, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Scalar> {
        match self {
            Self::Single(s) => Some(s),
            Self::Collection(items) => items.iter().flatten().next(),
            Self::Null | Self::MlText(_) => None,
        }
    }
}

impl From<Scalar> for PropertyValue {
    fn from(s: Scalar) -> Self {
        Self::Single(s)
    }
}

// =============================================================================
// CONTENT DESCRIPTORS
// =============================================================================

/// Descriptor of a content property's binary payload.
///
/// Wire form: `contentUrl=..|mimetype=..|size=..|encoding=..|locale=..`.
/// An empty `url` marks a pointer whose bytes were not exported.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentData {
    pub url: String,
    pub mimetype: String,
    pub size: u64,
    pub encoding: String,
    pub locale: Option<String>,
}

impl ContentData {
    /// Create a descriptor.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        mimetype: impl Into<String>,
        size: u64,
        encoding: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            mimetype: mimetype.into(),
            size,
            encoding: encoding.into(),
            locale: None,
        }
    }

    /// The same descriptor with a different URL.
    #[must_use]
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ContentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contentUrl={}|mimetype={}|size={}|encoding={}|locale={}",
            self.url,
            self.mimetype,
            self.size,
            self.encoding,
            self.locale.as_deref().unwrap_or("")
        )
    }
}

impl FromStr for ContentData {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self> {
        let mut data = ContentData::default();
        for part in s.trim().split('|').filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                ViewError::MalformedValue(format!("Content descriptor part '{}' has no '='", part))
            })?;
            match key {
                "contentUrl" => data.url = value.to_string(),
                "mimetype" => data.mimetype = value.to_string(),
                "size" if value.is_empty() => data.size = 0,
                "size" => {
                    data.size = value.parse().map_err(|e| {
                        ViewError::MalformedValue(format!("Content size '{}': {}", value, e))
                    })?;
                }
                "encoding" => data.encoding = value.to_string(),
                "locale" if value.is_empty() => data.locale = None,
                "locale" => data.locale = Some(value.to_string()),
                other => {
                    return Err(ViewError::MalformedValue(format!(
                        "Unknown content descriptor key '{}'",
                        other
                    )));
                }
            }
        }
        Ok(data)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn datatype_names_resolve() {
        for t in DataType::ALL {
            assert_eq!(DataType::from_qname(&t.qname()), Some(t));
        }
        assert_eq!(DataType::from_qname(&QName::new("urn:other", "text")), None);
    }

    #[test]
    fn coerce_typed_values() {
        assert_eq!(DataType::Long.coerce(" 42 ").unwrap(), Scalar::Long(42));
        assert_eq!(DataType::Boolean.coerce("TRUE").unwrap(), Scalar::Boolean(true));
        assert_eq!(DataType::Double.coerce("2.5").unwrap(), Scalar::Double(2.5));
        assert_eq!(
            DataType::Text.coerce("  padded ").unwrap(),
            Scalar::Text("  padded ".to_string())
        );
    }

    #[test]
    fn coerce_rejects_garbage() {
        assert!(matches!(
            DataType::Long.coerce("forty-two"),
            Err(ViewError::MalformedValue(_))
        ));
        assert!(DataType::Int.coerce("99999999999").is_err());
        assert!(DataType::Boolean.coerce("yes").is_err());
        assert!(DataType::NodeRef.coerce("not-a-ref").is_err());
    }

    #[test]
    fn scalar_text_roundtrips_through_its_datatype() {
        let node: NodeRef = "workspace://SpacesStore/n1".parse().unwrap();
        let values = vec![
            Scalar::Long(-7),
            Scalar::Double(0.125),
            Scalar::Boolean(false),
            Scalar::NodeRef(node),
            Scalar::QName(QName::new("urn:m", "x")),
        ];
        for v in values {
            let text = v.to_string();
            assert_eq!(v.data_type().coerce(&text).unwrap(), v);
        }
    }

    #[test]
    fn accepts_checks_shape() {
        assert!(DataType::Long.accepts(&Scalar::Long(1)));
        assert!(!DataType::Long.accepts(&Scalar::Text("abc".into())));
        assert!(DataType::Text.accepts(&Scalar::Long(1)));
    }

    #[test]
    fn content_descriptor_wire_form() {
        let data = ContentData::new("store://1", "text/plain", 12, "UTF-8");
        let text = data.to_string();
        assert_eq!(
            text,
            "contentUrl=store://1|mimetype=text/plain|size=12|encoding=UTF-8|locale="
        );
        assert_eq!(text.parse::<ContentData>().unwrap(), data);
    }

    #[test]
    fn empty_pointer_keeps_metadata() {
        let data: ContentData = "contentUrl=|mimetype=image/png|size=300|encoding=UTF-8|locale=en"
            .parse()
            .unwrap();
        assert!(data.url.is_empty());
        assert_eq!(data.mimetype, "image/png");
        assert_eq!(data.size, 300);
        assert_eq!(data.locale.as_deref(), Some("en"));
    }

    #[test]
    fn property_value_first() {
        let v = PropertyValue::Collection(vec![None, Some(Scalar::Long(3))]);
        assert_eq!(v.first(), Some(&Scalar::Long(3)));
        assert!(PropertyValue::Null.first().is_none());
    }
}
