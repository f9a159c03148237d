use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::OperationError;
use crate::parallel::lock;
use crate::template::TemplateNode;

/// Shared references declared by template nodes, keyed by their `id`.
///
/// The table is shared by every worker and guarded by one coarse lock.
/// Declaring an id again replaces the previous node.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    entries: Mutex<HashMap<String, TemplateNode>>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `node` under its `id` attribute and return the id.
    pub fn declare(&self, node: &TemplateNode) -> Result<String, OperationError> {
        let id = node
            .attribute("id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                OperationError::operation(format!("reference '{}' needs an 'id' attribute", node.name()))
            })?
            .to_string();

        if lock(&self.entries).insert(id.clone(), node.clone()).is_some() {
            tracing::trace!("Reference '{}' redeclared", id);
        }
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<TemplateNode> {
        lock(&self.entries).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
