use std::process::Command;

use crate::engine::ExecutionContext;
use crate::error::OperationError;
use crate::template::TemplateNode;

use super::Operation;

fn required<'n>(node: &'n TemplateNode, key: &str) -> Result<&'n str, OperationError> {
    node.attribute(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| OperationError::operation(format!("'{}' needs a '{key}' attribute", node.name())))
}

fn flag(node: &TemplateNode, key: &str, default: bool) -> Result<bool, OperationError> {
    match node.attribute(key).map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(OperationError::operation(format!(
                "'{}': '{key}' must be true or false, got '{value}'",
                node.name()
            ))),
        },
    }
}

/// Print a message.
pub struct Echo;

impl Operation for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn execute(&self, node: &TemplateNode, ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError> {
        let message = node.attribute("message").unwrap_or_default();
        tracing::info!("[worker-{}] {}", ctx.worker(), message);
        println!("{message}");
        Ok(())
    }
}

/// Run a shell command.
pub struct Exec;

impl Operation for Exec {
    fn name(&self) -> &str {
        "exec"
    }

    fn execute(&self, node: &TemplateNode, ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError> {
        let command_str = required(node, "command")?;
        let fail_on_error = flag(node, "failonerror", true)?;

        let mut command = Command::new("sh");
        command.arg("-c").arg(command_str);
        if let Some(dir) = node.attribute("dir").filter(|d| !d.is_empty()) {
            command.current_dir(dir);
        }

        tracing::debug!("[worker-{}] exec: {}", ctx.worker(), command_str);
        let output = command.output().map_err(|e| {
            OperationError::operation(format!("failed to start '{command_str}': {e}")).with_cause(e)
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.is_empty() {
            print!("{stdout}");
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut message = format!("command failed ({}): {command_str}", output.status);
        if !stderr.trim().is_empty() {
            message.push_str(&format!("\n{}", stderr.trim_end()));
        }

        if fail_on_error {
            Err(OperationError::operation(message))
        } else {
            tracing::warn!("[worker-{}] {} (continuing)", ctx.worker(), message);
            Ok(())
        }
    }
}

/// Register a local value for the rest of the current item.
pub struct SetLocal;

impl Operation for SetLocal {
    fn name(&self) -> &str {
        "set"
    }

    fn execute(&self, node: &TemplateNode, ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError> {
        let name = required(node, "name")?;
        let value = node.attribute("value").unwrap_or_default();
        ctx.scope().register(name, value);
        Ok(())
    }
}

/// Fail unconditionally.
pub struct Fail;

impl Operation for Fail {
    fn name(&self) -> &str {
        "fail"
    }

    fn execute(&self, node: &TemplateNode, _ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError> {
        let message = node
            .attribute("message")
            .filter(|m| !m.is_empty())
            .unwrap_or("fail operation reached");
        Err(OperationError::operation(message))
    }
}

/// Run nested operations with the same iteration context.
pub struct Group;

impl Operation for Group {
    fn name(&self) -> &str {
        "group"
    }

    fn execute(&self, node: &TemplateNode, ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError> {
        ctx.execute_children(node);
        Ok(())
    }
}
