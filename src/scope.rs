//! Per-worker local variable scopes
//!
//! Every worker owns exactly one [`LocalScope`] in the shared [`ScopeTable`].
//! The scope lives for a single iteration: it is cleared and re-seeded with the
//! loop variable at the start of every item, so nothing registered while
//! processing one item can be seen by the next, even on the same thread.
//!
//! Operations never look their scope up; they receive a [`ScopeHandle`] for
//! the current worker through the execution context.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::parallel::{WorkerId, lock};
use crate::template::{TemplateBinder, TemplateNode};

/// Name/value pairs visible to `${name}` placeholders for one iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalScope {
    values: HashMap<String, String>,
}

impl LocalScope {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Shared, lock-guarded map from worker to its local scope.
#[derive(Debug, Default)]
pub struct ScopeTable {
    scopes: Mutex<HashMap<WorkerId, LocalScope>>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new iteration for `worker`: drop everything from the previous
    /// item and bind the loop variable.
    pub fn begin_iteration(&self, worker: WorkerId, property: &str, item: &str) {
        let mut scopes = lock(&self.scopes);
        let scope = scopes.entry(worker).or_default();
        scope.clear();
        scope.set(property, item);
    }

    /// Remove the worker's scope once it leaves the pool.
    pub fn release(&self, worker: WorkerId) {
        lock(&self.scopes).remove(&worker);
    }

    /// Handle to the scope owned by `worker`.
    pub fn handle(&self, worker: WorkerId) -> ScopeHandle<'_> {
        ScopeHandle {
            table: self,
            worker,
        }
    }

    /// Copy of a worker's current scope.
    pub fn snapshot(&self, worker: WorkerId) -> Option<LocalScope> {
        lock(&self.scopes).get(&worker).cloned()
    }

    pub fn active_workers(&self) -> usize {
        lock(&self.scopes).len()
    }
}

/// Access to the one scope a worker owns. Each call holds the table lock only
/// for the duration of the lookup or update.
#[derive(Debug, Clone, Copy)]
pub struct ScopeHandle<'a> {
    table: &'a ScopeTable,
    worker: WorkerId,
}

impl ScopeHandle<'_> {
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn get(&self, name: &str) -> Option<String> {
        lock(&self.table.scopes)
            .get(&self.worker)
            .and_then(|scope| scope.get(name))
            .map(str::to_string)
    }

    /// Register a local value for the rest of the current iteration.
    pub fn register(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        tracing::trace!("worker-{} registers {} = {}", self.worker, name, value);
        lock(&self.table.scopes)
            .entry(self.worker)
            .or_default()
            .set(name, value);
    }

    /// Clone `node` with its attributes bound to the current scope.
    pub fn bind(&self, node: &TemplateNode) -> TemplateNode {
        let scopes = lock(&self.table.scopes);
        match scopes.get(&self.worker) {
            Some(scope) => TemplateBinder::bind_node(node, scope),
            None => node.clone(),
        }
    }
}
