//! Operations and the factory that classifies template nodes
//!
//! The engine treats operations as opaque capabilities. For every node it
//! asks an [`OperationFactory`] what the node name means: an executable
//! [`Operation`], a shared-reference declaration, or nothing it knows about.
//!
//! Factories are not required to be thread-safe. The engine owns its factory
//! behind a single lock and only calls it from there; the lock is released
//! before the operation itself runs.
//!
//! ## Built-in operations
//!
//! | name      | attributes                           | effect                                  |
//! |-----------|--------------------------------------|-----------------------------------------|
//! | `echo`    | `message`                            | logs and prints the message             |
//! | `exec`    | `command`, `failonerror` (true)      | runs the command through `sh -c`        |
//! | `set`     | `name`, `value`                      | registers a local value for this item   |
//! | `fail`    | `message`                            | fails with the message                  |
//! | `group`   | nested `do`                          | runs its children in order              |
//! | `fileset` | `id`, any other attributes           | declares a shared reference             |

mod builtin;
mod references;

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::ExecutionContext;
use crate::error::OperationError;
use crate::template::TemplateNode;

pub use builtin::{Echo, Exec, Fail, Group, SetLocal};
pub use references::ReferenceTable;

/// One executable step of a template.
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    /// Run against a node whose attributes are already bound to the current
    /// iteration's scope.
    fn execute(&self, node: &TemplateNode, ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError>;
}

/// What a template node name refers to.
#[derive(Clone)]
pub enum NodeKind {
    Operation(Arc<dyn Operation>),
    /// Declares a shared reference, stored by its `id` attribute.
    Reference,
}

impl std::fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Operation(op) => write!(f, "Operation({})", op.name()),
            NodeKind::Reference => f.write_str("Reference"),
        }
    }
}

/// Lookup-by-name for template nodes.
pub trait OperationFactory: Send {
    fn classify(&mut self, name: &str) -> Option<NodeKind>;
}

/// Default factory: a name → operation map plus a set of reference names.
#[derive(Default)]
pub struct Registry {
    operations: HashMap<String, Arc<dyn Operation>>,
    references: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operation and the `fileset` reference.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Echo);
        registry.register(Exec);
        registry.register(SetLocal);
        registry.register(Fail);
        registry.register(Group);
        registry.register_reference("fileset");
        registry
    }

    pub fn register<O: Operation + 'static>(&mut self, operation: O) {
        self.register_arc(Arc::new(operation));
    }

    pub fn register_arc(&mut self, operation: Arc<dyn Operation>) {
        self.operations.insert(operation.name().to_string(), operation);
    }

    pub fn register_reference(&mut self, name: impl Into<String>) {
        self.references.push(name.into());
    }

    /// Every operation and reference name, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .operations
            .keys()
            .chain(self.references.iter())
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl OperationFactory for Registry {
    fn classify(&mut self, name: &str) -> Option<NodeKind> {
        if let Some(operation) = self.operations.get(name) {
            return Some(NodeKind::Operation(Arc::clone(operation)));
        }
        self.references
            .iter()
            .any(|reference| reference == name)
            .then_some(NodeKind::Reference)
    }
}
