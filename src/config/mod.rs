//! Configuration for parloop runs
//!
//! Settings are layered with figment, lowest priority first: embedded
//! defaults, user config, repository `parloop.*`, an explicit `--config`
//! file, `PARLOOP_*` environment variables and finally command-line flags.

pub mod core;
pub mod formats;
pub mod settings;

use std::path::PathBuf;

use serde::Serialize;

use crate::sequencer::{OrderBy, OrderDirection};
use crate::source::{ItemKind, SplitOption};

pub use self::core::ParloopConfig;
pub use formats::ConfigFormat;
pub use settings::{LoopConfig, LoopSettings, ResolvedRun};

/// Command-line values layered on top of every other source.
///
/// Unset fields are skipped when serialized so they never mask file or
/// environment values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOverrides {
    #[serde(rename = "maxthreads", skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<usize>,
    #[serde(rename = "orderby", skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(rename = "orderdirection", skip_serializing_if = "Option::is_none")]
    pub order_direction: Option<OrderDirection>,
    #[serde(rename = "stoponfirsterror", skip_serializing_if = "Option::is_none")]
    pub stop_on_first_error: Option<bool>,
    #[serde(rename = "stoplooponerror", skip_serializing_if = "Option::is_none")]
    pub stop_loop_on_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delim: Option<String>,
    #[serde(rename = "splitoption", skip_serializing_if = "Option::is_none")]
    pub split_option: Option<SplitOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}
