//! Engine configuration.
//!
//! Options arrive either as string pairs (command line or form fields), as a
//! JSON object, or through builder methods. Unrecognised keys and values are
//! rejected with [`Error::Configuration`].

use crate::error::{Error, Result};
use crate::layout::{LayoutConfiguration, Margin, Orientation, PageSize};
use serde::Deserialize;

/// Default bound on the number of documents in one merge.
pub const DEFAULT_MAX_SOURCE_DOCUMENTS: usize = 20;

/// Default bound on page tree depth.
pub const DEFAULT_MAX_TRAVERSAL_DEPTH: usize = 64;

/// Default bound on array/dictionary nesting.
pub const DEFAULT_MAX_NESTING: usize = 100;

/// Options consumed by parsing, copying and image embedding.
///
/// # Example
///
/// ```
/// use pdf_splice::config::EngineConfig;
/// use pdf_splice::layout::Margin;
///
/// let config = EngineConfig::from_pairs(&[("margin", "big"), ("maxSourceDocuments", "5")]).unwrap();
/// assert_eq!(config.layout.margin, Margin::Big);
/// assert_eq!(config.max_source_documents, 5);
///
/// assert!(EngineConfig::from_pairs(&[("colour", "red")]).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Layout for pages generated from images
    pub layout: LayoutConfiguration,
    /// Most documents accepted by one merge
    pub max_source_documents: usize,
    /// Deepest page tree accepted
    pub max_traversal_depth: usize,
    /// Deepest array/dictionary nesting accepted by the parser
    pub max_nesting: usize,
    /// Reject documents containing references to undefined objects
    pub strict_references: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON form: a flat object with camelCase keys.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    page_size: Option<PageSize>,
    orientation: Option<Orientation>,
    margin: Option<Margin>,
    max_source_documents: Option<usize>,
    max_traversal_depth: Option<usize>,
    max_nesting: Option<usize>,
    strict_references: Option<bool>,
}

impl EngineConfig {
    /// Configuration with all defaults.
    pub fn new() -> Self {
        Self {
            layout: LayoutConfiguration::default(),
            max_source_documents: DEFAULT_MAX_SOURCE_DOCUMENTS,
            max_traversal_depth: DEFAULT_MAX_TRAVERSAL_DEPTH,
            max_nesting: DEFAULT_MAX_NESTING,
            strict_references: true,
        }
    }

    /// Set the page layout.
    pub fn with_layout(mut self, layout: LayoutConfiguration) -> Self {
        self.layout = layout;
        self
    }

    /// Set the merge size limit.
    pub fn with_max_source_documents(mut self, limit: usize) -> Self {
        self.max_source_documents = limit;
        self
    }

    /// Set the page tree depth limit.
    pub fn with_max_traversal_depth(mut self, depth: usize) -> Self {
        self.max_traversal_depth = depth;
        self
    }

    /// Set the object nesting limit.
    pub fn with_max_nesting(mut self, depth: usize) -> Self {
        self.max_nesting = depth;
        self
    }

    /// Accept (false) or reject (true) dangling references.
    pub fn with_strict_references(mut self, strict: bool) -> Self {
        self.strict_references = strict;
        self
    }

    /// Build from `(key, value)` string pairs.
    ///
    /// Keys: `pageSize`, `orientation`, `margin`, `maxSourceDocuments`,
    /// `maxTraversalDepth`, `maxNesting`, `strictReferences`.
    pub fn from_pairs<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> Result<Self> {
        let mut config = Self::new();
        for (key, value) in pairs {
            config.set(key.as_ref(), value.as_ref())?;
        }
        config.validate()
    }

    /// Build from a JSON object.
    ///
    /// ```
    /// use pdf_splice::config::EngineConfig;
    ///
    /// let config = EngineConfig::from_json(r#"{"pageSize": "letter", "maxTraversalDepth": 16}"#).unwrap();
    /// assert_eq!(config.max_traversal_depth, 16);
    /// assert!(EngineConfig::from_json(r#"{"pageSize": "tabloid"}"#).is_err());
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid configuration: {}", e)))?;
        let mut config = Self::new();
        if let Some(v) = raw.page_size {
            config.layout.page_size = v;
        }
        if let Some(v) = raw.orientation {
            config.layout.orientation = v;
        }
        if let Some(v) = raw.margin {
            config.layout.margin = v;
        }
        if let Some(v) = raw.max_source_documents {
            config.max_source_documents = v;
        }
        if let Some(v) = raw.max_traversal_depth {
            config.max_traversal_depth = v;
        }
        if let Some(v) = raw.max_nesting {
            config.max_nesting = v;
        }
        if let Some(v) = raw.strict_references {
            config.strict_references = v;
        }
        config.validate()
    }

    /// Apply a single option.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "pageSize" => self.layout.page_size = value.parse()?,
            "orientation" => self.layout.orientation = value.parse()?,
            "margin" => self.layout.margin = value.parse()?,
            "maxSourceDocuments" => self.max_source_documents = parse_count(key, value)?,
            "maxTraversalDepth" => self.max_traversal_depth = parse_count(key, value)?,
            "maxNesting" => self.max_nesting = parse_count(key, value)?,
            "strictReferences" => {
                self.strict_references = value.trim().parse().map_err(|_| {
                    Error::Configuration(format!("{} must be true or false, got '{}'", key, value))
                })?
            },
            _ => return Err(Error::Configuration(format!("unrecognized option '{}'", key))),
        }
        Ok(())
    }

    /// Check that every limit is usable.
    pub fn validate(self) -> Result<Self> {
        for (key, value) in [
            ("maxSourceDocuments", self.max_source_documents),
            ("maxTraversalDepth", self.max_traversal_depth),
            ("maxNesting", self.max_nesting),
        ] {
            if value == 0 {
                return Err(Error::Configuration(format!("{} must be at least 1", key)));
            }
        }
        Ok(self)
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("{} must be a non-negative integer, got '{}'", key, value)))
}
