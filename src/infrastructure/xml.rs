//! Thin XML layer over `xot`, shared by the manifest, cache and feed stores.

use thiserror::Error;
use xot::{Node, Xot};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XmlError {
    #[error("Invalid XML: {0}")]
    Parse(String),

    #[error("Expected root element <{expected}>")]
    UnexpectedRoot { expected: String },

    #[error("Invalid boolean value for '{attribute}': {value}")]
    InvalidBool { attribute: String, value: String },

    #[error("Could not write XML: {0}")]
    Write(String),
}

/// A parsed, read-only XML document.
pub struct XmlDocument {
    xot: Xot,
    root: Node,
}

impl XmlDocument {
    pub fn parse(text: &str) -> Result<Self, XmlError> {
        let mut xot = Xot::new();
        let document = xot
            .parse(text)
            .map_err(|e| XmlError::Parse(e.to_string()))?;
        let root = xot
            .document_element(document)
            .map_err(|e| XmlError::Parse(e.to_string()))?;
        Ok(Self { xot, root })
    }

    /// Parse and check the name of the root element.
    pub fn parse_with_root(text: &str, expected: &str) -> Result<Self, XmlError> {
        let document = Self::parse(text)?;
        if !document.is_named(document.root, expected) {
            return Err(XmlError::UnexpectedRoot {
                expected: expected.to_string(),
            });
        }
        Ok(document)
    }

    pub fn root(&self) -> Node {
        self.root
    }

    pub fn is_named(&self, node: Node, name: &str) -> bool {
        match (self.xot.element(node), self.xot.name(name)) {
            (Some(element), Some(name_id)) => element.name() == name_id,
            _ => false,
        }
    }

    /// Child elements of `node` called `name`, in document order.
    pub fn children_named(&self, node: Node, name: &str) -> Vec<Node> {
        self.xot
            .children(node)
            .filter(|child| self.is_named(*child, name))
            .collect()
    }

    pub fn child_named(&self, node: Node, name: &str) -> Option<Node> {
        self.xot
            .children(node)
            .find(|child| self.is_named(*child, name))
    }

    pub fn attribute(&self, node: Node, name: &str) -> Option<&str> {
        let name_id = self.xot.name(name)?;
        self.xot.get_attribute(node, name_id)
    }

    pub fn string_attribute(&self, node: Node, name: &str) -> Option<String> {
        self.attribute(node, name).map(|v| v.to_string())
    }

    /// Space separated list attribute.
    pub fn list_attribute(&self, node: Node, name: &str) -> Vec<String> {
        self.attribute(node, name)
            .map(|v| v.split_whitespace().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    }

    pub fn bool_attribute(&self, node: Node, name: &str) -> Result<Option<bool>, XmlError> {
        match self.attribute(node, name) {
            None => Ok(None),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(XmlError::InvalidBool {
                    attribute: name.to_string(),
                    value: value.to_string(),
                }),
            },
        }
    }
}

/// Owned element tree used to write documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Only set the attribute when there is a value.
    pub fn opt_attr(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.attr(name, value),
            None => self,
        }
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        let mut xot = Xot::new();
        let root = build_node(&mut xot, self)?;
        let document = xot
            .new_document_with_element(root)
            .map_err(|e| XmlError::Write(e.to_string()))?;
        let body = xot
            .to_string(document)
            .map_err(|e| XmlError::Write(e.to_string()))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}\n", body))
    }
}

fn build_node(xot: &mut Xot, element: &XmlElement) -> Result<Node, XmlError> {
    let name = xot.add_name(&element.name);
    let node = xot.new_element(name);
    for (key, value) in &element.attributes {
        let key = xot.add_name(key);
        xot.set_attribute(node, key, value.clone());
    }
    for child in &element.children {
        let child = build_node(xot, child)?;
        xot.append(node, child)
            .map_err(|e| XmlError::Write(e.to_string()))?;
    }
    Ok(node)
}
