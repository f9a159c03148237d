use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::scope::LocalScope;

use super::{Template, TemplateNode};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\$\{([^}]+)\}").expect("placeholder regex is valid");
}

/// Replace every `${name}` whose name is present in `scope` with its value.
///
/// Replacement is a single textual pass: substituted values are never scanned
/// again, and placeholders with no value in scope are left as written.
pub fn expand_placeholders(text: &str, scope: &LocalScope) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match scope.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names of the placeholders in `text` that `scope` cannot resolve.
pub fn unresolved_placeholders<'t>(text: &'t str, scope: &LocalScope) -> Vec<&'t str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str())
        .filter(|name| scope.get(name).is_none())
        .collect()
}

/// One iteration's view of the per-item template.
///
/// The view borrows the shared template; each node is cloned only when it is
/// bound, so an iteration never mutates what other workers read.
#[derive(Debug, Clone, Copy)]
pub struct BoundTemplate<'t> {
    root: &'t TemplateNode,
}

impl<'t> BoundTemplate<'t> {
    /// The per-item block itself.
    pub fn root(&self) -> &'t TemplateNode {
        self.root
    }

    pub fn operations(&self) -> &'t [TemplateNode] {
        self.root.children()
    }
}

/// Gives every iteration a view of the template and binds nodes to the
/// iteration's scope right before they run.
pub struct TemplateBinder<'t> {
    template: &'t Template,
}

impl<'t> TemplateBinder<'t> {
    pub fn new(template: &'t Template) -> Self {
        Self { template }
    }

    /// Start one iteration over the template.
    pub fn bind(&self) -> BoundTemplate<'t> {
        BoundTemplate {
            root: self.template.root(),
        }
    }

    /// Clone one node and substitute its attributes from the current scope.
    ///
    /// Values registered earlier in the same iteration are visible here.
    pub fn bind_node(node: &TemplateNode, scope: &LocalScope) -> TemplateNode {
        let mut bound = node.clone();
        bound.substitute(scope);
        for (key, value) in bound.attributes() {
            let missing = unresolved_placeholders(value, scope);
            if !missing.is_empty() {
                tracing::trace!(
                    "Unresolved placeholders in {}.{}: {:?}",
                    bound.name(),
                    key,
                    missing
                );
            }
        }
        bound
    }
}
