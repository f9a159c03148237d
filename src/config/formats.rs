use std::path::Path;

use anyhow::Result;

use super::core::ParloopConfig;

/// Structured text formats for configuration and templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Format named by a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        Self::from_name(extension)
    }

    /// Format by name: json, toml, yaml or yml (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(ConfigFormat::Json),
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            _ => None,
        }
    }

    pub fn parse(&self, content: &str) -> Result<serde_json::Value> {
        let value = match self {
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yml::from_str(content)?,
        };
        Ok(value)
    }

    pub fn render(&self, value: &serde_json::Value) -> Result<String> {
        let output = match self {
            ConfigFormat::Json => serde_json::to_string_pretty(value)?,
            ConfigFormat::Toml => toml::to_string_pretty(value)?,
            ConfigFormat::Yaml => serde_yml::to_string(value)?,
        };
        Ok(output)
    }
}

impl ParloopConfig {
    /// Export the merged configuration in the given format
    pub fn export_config(&self, format: ConfigFormat) -> Result<String> {
        let config: serde_json::Value = self.get_full_config()?;
        format.render(&config)
    }
}
