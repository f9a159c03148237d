use std::fmt;

use crate::scope::LocalScope;

use super::binder::expand_placeholders;

/// Where a template node was declared.
///
/// Set once when the template is loaded and carried through every clone the
/// binder makes, so a failure can always name the node it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// Template file (or any label for programmatic templates)
    pub file: String,
    /// Path of the node inside the template, e.g. `do[2].do[0]`
    pub path: String,
}

impl Location {
    pub fn new(file: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.path)
    }
}

/// One named node of an operation template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNode {
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<TemplateNode>,
    location: Option<Location>,
}

impl TemplateNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            attributes: Vec::new(),
            children: Vec::new(),
            location: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn with_child(mut self, child: TemplateNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
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

    /// Insert or replace an attribute, keeping declaration order.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn children(&self) -> &[TemplateNode] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: TemplateNode) {
        self.children.push(child);
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: Location) {
        self.location = Some(location);
    }

    /// Whether this node belongs to a namespace other than `expected`.
    ///
    /// Nodes without a namespace are never foreign.
    pub fn is_foreign(&self, expected: Option<&str>) -> bool {
        match (&self.namespace, expected) {
            (None, _) => false,
            (Some(own), Some(expected)) => own != expected,
            (Some(_), None) => true,
        }
    }

    /// Rewrite this node's own attributes from `scope`. Children are left
    /// untouched; they are substituted when they execute.
    pub fn substitute(&mut self, scope: &LocalScope) {
        for (_, value) in self.attributes.iter_mut() {
            if value.contains("${") {
                *value = expand_placeholders(value, scope);
            }
        }
    }

    /// Total number of nodes in this subtree, this node included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TemplateNode::node_count).sum::<usize>()
    }
}
