//! Per-item operation templates
//!
//! A template is a tree of named nodes with string attributes. The root is the
//! per-item block; its children are the operations run, in order, for every
//! item. Nodes carry an explicit [`Location`] from the moment they are loaded,
//! so clones made for each iteration never lose track of where they came from.

mod binder;
mod loader;
mod node;

pub use binder::{BoundTemplate, TemplateBinder, expand_placeholders, unresolved_placeholders};
pub use loader::{load_template, parse_template};
pub use node::{Location, TemplateNode};

/// The per-item block, declared once and cloned for every iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    root: TemplateNode,
}

impl Template {
    pub fn new(root: TemplateNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &TemplateNode {
        &self.root
    }

    /// Location of the per-item block, used when nothing more precise is known.
    pub fn location(&self) -> Option<&Location> {
        self.root.location()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children().is_empty()
    }
}
