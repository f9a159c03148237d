use std::path::Path;

use serde_json::{Map, Value};

use crate::config::ConfigFormat;
use crate::error::LoopError;

use super::{Location, Template, TemplateNode};

const NAME_KEY: &str = "op";
const NAMESPACE_KEY: &str = "ns";
const CHILDREN_KEY: &str = "do";

/// Load a template file. The format is picked from the file extension.
pub fn load_template(path: &Path) -> Result<Template, LoopError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LoopError::configuration(format!(
            "failed to read template '{}': {e}",
            path.display()
        ))
    })?;
    let format = ConfigFormat::from_path(path).ok_or_else(|| {
        LoopError::configuration(format!(
            "unsupported template format '{}' (use .yaml, .yml, .toml or .json)",
            path.display()
        ))
    })?;

    tracing::debug!("Loading template {} as {:?}", path.display(), format);
    parse_template(&content, format, &path.display().to_string())
}

/// Parse template text. `label` names the template in node locations.
pub fn parse_template(content: &str, format: ConfigFormat, label: &str) -> Result<Template, LoopError> {
    let value: Value = format.parse(content).map_err(|e| {
        LoopError::configuration(format!("failed to parse template '{label}': {e}"))
    })?;

    let operations = match &value {
        Value::Object(map) => match map.get(CHILDREN_KEY) {
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(LoopError::configuration(format!(
                    "template '{label}': '{CHILDREN_KEY}' must be a list"
                )));
            }
            None => {
                return Err(LoopError::configuration(format!(
                    "template '{label}' has no '{CHILDREN_KEY}' block"
                )));
            }
        },
        Value::Array(items) => items.as_slice(),
        _ => {
            return Err(LoopError::configuration(format!(
                "template '{label}' must be a map with a '{CHILDREN_KEY}' list"
            )));
        }
    };

    let mut root = TemplateNode::new(CHILDREN_KEY).with_location(Location::new(label, CHILDREN_KEY));
    for (index, item) in operations.iter().enumerate() {
        let path = format!("{CHILDREN_KEY}[{index}]");
        root.push_child(parse_node(item, label, &path)?);
    }

    tracing::trace!(
        "Parsed template {} ({} nodes)",
        label,
        root.node_count()
    );
    Ok(Template::new(root))
}

fn parse_node(value: &Value, label: &str, path: &str) -> Result<TemplateNode, LoopError> {
    let map: &Map<String, Value> = value.as_object().ok_or_else(|| {
        LoopError::configuration(format!("{label}:{path}: node must be a map"))
    })?;

    let name = match map.get(NAME_KEY) {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim(),
        _ => {
            return Err(LoopError::configuration(format!(
                "{label}:{path}: node needs a non-empty '{NAME_KEY}'"
            )));
        }
    };

    let mut node = TemplateNode::new(name).with_location(Location::new(label, format!("{path} ({name})")));

    if let Some(namespace) = map.get(NAMESPACE_KEY) {
        let namespace = scalar_to_string(namespace).ok_or_else(|| {
            LoopError::configuration(format!("{label}:{path}: '{NAMESPACE_KEY}' must be a string"))
        })?;
        node = node.with_namespace(namespace);
    }

    for (key, value) in map {
        match key.as_str() {
            NAME_KEY | NAMESPACE_KEY => {}
            CHILDREN_KEY => {
                let children = value.as_array().ok_or_else(|| {
                    LoopError::configuration(format!("{label}:{path}: '{CHILDREN_KEY}' must be a list"))
                })?;
                for (index, child) in children.iter().enumerate() {
                    let child_path = format!("{path}.{CHILDREN_KEY}[{index}]");
                    node.push_child(parse_node(child, label, &child_path)?);
                }
            }
            _ => {
                let text = scalar_to_string(value).ok_or_else(|| {
                    LoopError::configuration(format!(
                        "{label}:{path}: attribute '{key}' must be a scalar"
                    ))
                })?;
                node.set_attribute(key.as_str(), text);
            }
        }
    }

    Ok(node)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
