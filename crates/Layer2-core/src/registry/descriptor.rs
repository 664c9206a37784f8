//! Service descriptors - 레지스트리에 저장되는 서비스 정의

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// MetadataValue
// ============================================================================

/// Free-form metadata value (`"type": "builtin"`, `"version": 2`, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for MetadataValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

// ============================================================================
// ServiceDescriptor
// ============================================================================

/// A named service and the capability tags it provides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    /// Unique key in the registry
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Capability tags, no duplicates, in declaration order
    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_capability(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.capabilities.contains(&tag) {
            self.capabilities.push(tag);
        }
        self
    }

    pub fn with_capabilities<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tags.into_iter().fold(self, |d, tag| d.with_capability(tag))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }

    /// `metadata["type"]` as text, if present
    pub fn kind(&self) -> Option<&str> {
        self.metadata.get("type").and_then(MetadataValue::as_str)
    }

    /// Trim and drop empty or repeated capability tags
    pub(crate) fn normalized(mut self) -> Self {
        let mut seen = Vec::with_capacity(self.capabilities.len());
        for tag in self.capabilities.drain(..) {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !seen.contains(&tag) {
                seen.push(tag);
            }
        }
        self.capabilities = seen;
        self.name = self.name.trim().to_string();
        self
    }
}
