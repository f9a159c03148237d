use std::path::Path;

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::Serialize;

use super::formats::ConfigFormat;
use super::settings::LoopSettings;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

const CONFIG_EXTENSIONS: [&str; 4] = ["toml", "json", "yaml", "yml"];

pub struct ParloopConfig {
    figment: Figment,
}

impl ParloopConfig {
    pub fn load<T: Serialize>(custom_config: Option<&str>, cli_overrides: Option<T>) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG)); // 1. Defaults (lowest)
        figment = Self::merge_any_format(figment, &Self::user_config_base_path()); // 2. User config
        figment = Self::merge_any_format(figment, "parloop"); // 3. Repo config

        // 4. Custom config (if provided)
        if let Some(path) = custom_config {
            let custom = Path::new(path);
            if !custom.is_file() {
                bail!("Config file not found: {}", path);
            }
            let format = ConfigFormat::from_path(custom)
                .with_context(|| format!("Unsupported config format: {} (use .toml, .json, .yaml or .yml)", path))?;
            tracing::trace!("CONFIG LOAD: Custom {:?} config from {}", format, path);
            figment = match format {
                ConfigFormat::Toml => figment.merge(Toml::file(custom)),
                ConfigFormat::Json => figment.merge(Json::file(custom)),
                ConfigFormat::Yaml => figment.merge(Yaml::file(custom)),
            };
        }

        figment = figment.merge(Env::prefixed("PARLOOP_")); // 5. Environment variables

        if let Some(cli) = cli_overrides {
            // 6. CLI (highest priority)
            tracing::trace!("CONFIG LOAD: Applying CLI overrides");
            figment = figment.merge(Serialized::defaults(cli));
        }

        Ok(ParloopConfig { figment })
    }

    /// Typed view of the merged configuration.
    pub fn settings(&self) -> Result<LoopSettings> {
        let settings = self
            .figment
            .extract()
            .context("Invalid parloop configuration")?;
        Ok(settings)
    }

    /// Get the full merged configuration as a structured value
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        let value = self.figment.extract()?;
        Ok(value)
    }

    fn merge_any_format(figment: Figment, base: &str) -> Figment {
        CONFIG_EXTENSIONS.iter().fold(figment, |figment, extension| {
            let path = format!("{}.{}", base, extension);
            match *extension {
                "toml" => figment.merge(Toml::file(path)),
                "json" => figment.merge(Json::file(path)),
                _ => figment.merge(Yaml::file(path)),
            }
        })
    }

    fn user_config_base_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{}/.config/parloop/config", home),
            Err(_) => "~/.config/parloop/config".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CliOverrides;
    use crate::sequencer::OrderBy;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_loading() {
        let config = ParloopConfig::load(None, None::<&()>);
        assert!(config.is_ok(), "Should load default config successfully");
    }

    #[test]
    fn test_config_loads_defaults() {
        let config = ParloopConfig::load(None, None::<&()>).expect("Should load default config");

        let full_config = config.get_full_config().unwrap();
        assert!(full_config.get("maxthreads").is_some());
        assert!(full_config.get("stoplooponerror").is_some());

        let settings = config.settings().unwrap();
        assert!(settings.stop_on_first_error);
        assert!(settings.stop_loop_on_error);
        assert_eq!(settings.order_by, OrderBy::None);
    }

    #[test]
    fn test_custom_config_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, "maxthreads: 3\norderby: name\nstoponfirsterror: false\n").unwrap();

        let config = ParloopConfig::load(path.to_str(), None::<&()>).unwrap();
        let settings = config.settings().unwrap();
        assert_eq!(settings.max_threads, 3);
        assert_eq!(settings.order_by, OrderBy::Name);
        assert!(!settings.stop_on_first_error);
        assert!(settings.stop_loop_on_error);
    }

    #[test]
    fn test_cli_overrides_win_over_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        fs::write(&path, "maxthreads = 3\nproperty = \"from_file\"\n").unwrap();

        let overrides = CliOverrides {
            max_threads: Some(5),
            ..Default::default()
        };
        let config = ParloopConfig::load(path.to_str(), Some(&overrides)).unwrap();
        let settings = config.settings().unwrap();
        assert_eq!(settings.max_threads, 5);
        // Unset overrides leave file values alone
        assert_eq!(settings.property, "from_file");
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        let config = ParloopConfig::load(Some("non_existent.toml"), None::<&()>);
        assert!(config.is_err());
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.json");
        fs::write(&path, r#"{"orderby": "colour"}"#).unwrap();

        let config = ParloopConfig::load(path.to_str(), None::<&()>).unwrap();
        assert!(config.settings().is_err());
    }
}
