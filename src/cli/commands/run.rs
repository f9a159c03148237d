use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::de::DeserializeOwned;

use crate::cli::Output;
use crate::config::{CliOverrides, ParloopConfig};
use crate::engine::ForEachEngine;
use crate::error::LoopError;
use crate::operations::Registry;
use crate::sequencer::{OrderBy, OrderDirection};
use crate::source::{ItemKind, SplitOption};
use crate::template::load_template;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Per-item template file (.yaml, .yml, .toml or .json)
    #[arg(short, long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Item kind: file, folder, line or string
    #[arg(long, value_name = "KIND", value_parser = parse_keyword::<ItemKind>)]
    pub item: Option<ItemKind>,

    /// Loop variable name, used as ${NAME} in the template
    #[arg(short, long, value_name = "NAME")]
    pub property: Option<String>,

    /// Base directory, text file or delimited string, depending on --item
    #[arg(long = "in", value_name = "INPUT")]
    pub input: Option<String>,

    /// Token delimiter for string items
    #[arg(long, value_name = "DELIM")]
    pub delim: Option<String>,

    /// none or removeEmptyEntries
    #[arg(long, value_name = "OPTION", value_parser = parse_keyword::<SplitOption>)]
    pub splitoption: Option<SplitOption>,

    /// Worker ceiling; 0 uses one per core
    #[arg(long, value_name = "N")]
    pub maxthreads: Option<usize>,

    /// none, name or size
    #[arg(long, value_name = "CRITERION", value_parser = parse_keyword::<OrderBy>)]
    pub orderby: Option<OrderBy>,

    /// ascending or descending
    #[arg(long, value_name = "DIRECTION", value_parser = parse_keyword::<OrderDirection>)]
    pub orderdirection: Option<OrderDirection>,

    /// Stop every worker after the first failure
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
    pub stoponfirsterror: Option<bool>,

    /// Skip an item's remaining operations after a failure
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
    pub stoplooponerror: Option<bool>,

    /// Glob of paths to include, relative to --in (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub include: Vec<String>,

    /// Glob of paths to exclude, relative to --in (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Only run template nodes in this namespace (or in none)
    #[arg(long, value_name = "NS")]
    pub namespace: Option<String>,
}

impl RunArgs {
    fn into_overrides(self) -> CliOverrides {
        CliOverrides {
            max_threads: self.maxthreads,
            order_by: self.orderby,
            order_direction: self.orderdirection,
            stop_on_first_error: self.stoponfirsterror,
            stop_loop_on_error: self.stoplooponerror,
            item: self.item,
            property: self.property,
            input: self.input,
            delim: self.delim,
            split_option: self.splitoption,
            include: self.include,
            exclude: self.exclude,
            template: self.template,
            namespace: self.namespace,
        }
    }
}

/// Keywords share their spelling with the configuration files.
fn parse_keyword<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|e| e.to_string())
}

pub fn execute(args: RunArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    let config = ParloopConfig::load(custom_config, Some(args.into_overrides()))?;
    let resolved = config.settings()?.resolve()?;

    let template_path = resolved
        .template
        .as_deref()
        .context("No template given: pass --template FILE or set 'template' in parloop.toml")?;
    let template = load_template(template_path)?;

    let items = resolved.source.resolve()?;
    output.step(&format!(
        "Running {} over {} {:?} item(s)",
        template_path.display(),
        items.len(),
        resolved.source.kind()
    ));
    output.verbose(&format!(
        "maxthreads={} orderby={:?} orderdirection={:?} stoponfirsterror={} stoplooponerror={}",
        resolved.config.effective_max_threads(),
        resolved.config.order_by,
        resolved.config.order_direction,
        resolved.config.stop_on_first_error,
        resolved.config.stop_loop_on_error
    ));

    let engine = ForEachEngine::new(resolved.config, template, Registry::with_builtins());
    match engine.run(items) {
        Ok(report) => {
            output.success(&format!(
                "Processed {}/{} item(s) with {} worker(s) in {:.2}s",
                report.items_processed,
                report.items_total,
                report.workers,
                report.elapsed.as_secs_f64()
            ));
            Ok(())
        }
        Err(error) => {
            if let LoopError::Failed { records, report, .. } = &error {
                output.error(&format!(
                    "{} failure(s) after {}/{} item(s)",
                    records.len(),
                    report.items_processed,
                    report.items_total
                ));
                for record in records.iter().skip(1) {
                    output.list_item(&record.to_string());
                }
            }
            Err(error.into())
        }
    }
}
