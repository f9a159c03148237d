use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};

use crate::cli::Output;
use crate::config::{ConfigFormat, ParloopConfig};
use crate::operations::Registry;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display current merged configuration
    Show {
        /// Output format: json, toml, yaml
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
    /// Check that the merged configuration describes a runnable loop
    Validate,
}

pub fn execute(args: ConfigArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    let config = ParloopConfig::load(custom_config, None::<&()>)?;

    match args.command {
        ConfigCommand::Show { format } => {
            let format_enum = ConfigFormat::from_name(&format)
                .ok_or_else(|| anyhow!("Unsupported format: {}. Use json, toml, or yaml", format))?;
            let rendered = config.export_config(format_enum)?;
            println!("{}", rendered.trim_end());
        }
        ConfigCommand::Validate => {
            let resolved = config.settings()?.resolve()?;
            output.success("Configuration is valid");
            output.key_value("item", &format!("{:?}", resolved.source.kind()));
            output.key_value("property", &resolved.config.property);
            output.key_value("maxthreads", &resolved.config.effective_max_threads().to_string());
            if let Some(template) = &resolved.template {
                output.key_value("template", &template.display().to_string());
            }
            output.key_value("operations", &Registry::with_builtins().names().join(", "));
        }
    }
    Ok(())
}
