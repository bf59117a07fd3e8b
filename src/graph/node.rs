//! Node representation in the retrieval graph

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Opaque string identifier for a graph node (an RDF resource URI)
///
/// Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    /// Create a Uri from a string
    pub fn from_string(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Uri {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Uri {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Canonical namespace for node type URIs
pub const TYPE_NAMESPACE: &str = "http://purl.org/stuff/ragno/";

/// Primary node type tag
///
/// Closed set used for routing and per-type rankings. Derived from a node's
/// declared RDF types by matching against [`TYPE_NAMESPACE`]; anything
/// outside the set maps to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Entity,
    Relationship,
    Unit,
    Attribute,
    CommunityElement,
    TextElement,
    Meta,
    Unknown,
}

impl NodeKind {
    /// All tags that can be derived from declared RDF types.
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Entity,
        NodeKind::Relationship,
        NodeKind::Unit,
        NodeKind::Attribute,
        NodeKind::CommunityElement,
        NodeKind::TextElement,
        NodeKind::Meta,
    ];

    /// Derive the primary tag from a set of declared RDF type URIs.
    ///
    /// The first declared type inside the ragno namespace wins; nodes with
    /// no recognised type are `Unknown`.
    pub fn from_rdf_types<S: AsRef<str>>(types: &[S]) -> Self {
        for t in types {
            if let Some(kind) = Self::from_type_uri(t.as_ref()) {
                return kind;
            }
        }
        NodeKind::Unknown
    }

    /// Derive a tag from a single type URI, if it is in the ragno namespace.
    pub fn from_type_uri(uri: &str) -> Option<Self> {
        let pos = uri.find(TYPE_NAMESPACE)?;
        let local = &uri[pos + TYPE_NAMESPACE.len()..];
        match local {
            "Entity" => Some(NodeKind::Entity),
            "Relationship" => Some(NodeKind::Relationship),
            "Unit" => Some(NodeKind::Unit),
            "Attribute" => Some(NodeKind::Attribute),
            "CommunityElement" => Some(NodeKind::CommunityElement),
            "TextElement" => Some(NodeKind::TextElement),
            "Meta" => Some(NodeKind::Meta),
            _ => None,
        }
    }

    /// Canonical type URI for this tag (`Unknown` has none).
    pub fn type_uri(&self) -> Option<String> {
        match self {
            NodeKind::Unknown => None,
            other => Some(format!("{}{}", TYPE_NAMESPACE, other.as_str())),
        }
    }

    /// Stable name, identical to the local part of the canonical URI.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Entity => "Entity",
            NodeKind::Relationship => "Relationship",
            NodeKind::Unit => "Unit",
            NodeKind::Attribute => "Attribute",
            NodeKind::CommunityElement => "CommunityElement",
            NodeKind::TextElement => "TextElement",
            NodeKind::Meta => "Meta",
            NodeKind::Unknown => "Unknown",
        }
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Entity" => Ok(NodeKind::Entity),
            "Relationship" => Ok(NodeKind::Relationship),
            "Unit" => Ok(NodeKind::Unit),
            "Attribute" => Ok(NodeKind::Attribute),
            "CommunityElement" => Ok(NodeKind::CommunityElement),
            "TextElement" => Ok(NodeKind::TextElement),
            "Meta" => Ok(NodeKind::Meta),
            "Unknown" => Ok(NodeKind::Unknown),
            _ => Err(format!("unknown node kind: {}", s)),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node in the retrieval graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique identifier
    pub uri: Uri,
    /// Primary type tag
    pub kind: NodeKind,
    /// Optional content text
    pub content: Option<String>,
    /// Optional summary text
    pub summary: Option<String>,
}

impl GraphNode {
    /// Create a new node with the given identifier and tag
    pub fn new(uri: impl Into<Uri>, kind: NodeKind) -> Self {
        Self {
            uri: uri.into(),
            kind,
            content: None,
            summary: None,
        }
    }

    /// Set the content text
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the summary text
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}
