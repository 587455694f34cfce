/*!
 * Core types and data structures for fs2dad
 */

use std::fmt;

/// Element names used in the generated document
pub mod tags {
    pub const ROOT: &str = "DataArchitectureDesign";
    pub const CREATE: &str = "Create";
    pub const FILE_SYSTEM: &str = "FileSystem";
    pub const FOLDER: &str = "Folder";
    pub const FILE: &str = "File";
}

/// One element of the generated document
///
/// A node owns its children outright; subtrees are built bottom-up and moved
/// into their parent once complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    /// Element name
    pub tag: String,
    /// Attributes in insertion order, keys unique
    attributes: Vec<(String, String)>,
    /// Child elements, rendered after the payload
    pub children: Vec<DocumentNode>,
    /// Text embedded in the element
    pub payload: Option<String>,
}

impl DocumentNode {
    /// Create an element with no attributes, children or payload
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            payload: None,
        }
    }

    /// Builder form of [`DocumentNode::set_attribute`]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Set an attribute; an existing key keeps its position
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Attach a finished subtree
    pub fn push_child(&mut self, child: DocumentNode) {
        self.children.push(child);
    }

    /// Builder form of [`DocumentNode::push_child`]
    pub fn with_child(mut self, child: DocumentNode) -> Self {
        self.push_child(child);
        self
    }

    pub fn set_payload(&mut self, text: impl Into<String>) {
        self.payload = Some(text.into());
    }

    /// The payload, if it has any text in it
    pub fn text(&self) -> Option<&str> {
        self.payload.as_deref().filter(|t| !t.is_empty())
    }

    /// Elements with neither children nor text render self-closing
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.text().is_none()
    }

    /// Value of the `Name` attribute
    pub fn name(&self) -> Option<&str> {
        self.attribute("Name")
    }

    /// Direct child with the given tag and `Name`
    pub fn find_child(&self, tag: &str, name: &str) -> Option<&DocumentNode> {
        self.children
            .iter()
            .find(|c| c.tag == tag && c.name() == Some(name))
    }
}

/// How a visited file ended up in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Decoded text embedded as payload
    Text,
    /// Binary content replaced by a marker
    Binary,
    /// Read or decode failure replaced by a marker
    Unreadable,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileKind::Text => "text",
            FileKind::Binary => "binary",
            FileKind::Unreadable => "unreadable",
        };
        f.write_str(label)
    }
}
