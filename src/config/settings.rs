use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::aggregator::StopPolicy;
use crate::error::LoopError;
use crate::parallel::ExecutionStrategy;
use crate::sequencer::{OrderBy, OrderDirection};
use crate::source::{ItemKind, SourceInputs, SourceSpec, SplitOption};

/// Every configuration key, as merged from defaults, files, env and CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    #[serde(rename = "maxthreads")]
    pub max_threads: usize,
    #[serde(rename = "orderby")]
    pub order_by: OrderBy,
    #[serde(rename = "orderdirection")]
    pub order_direction: OrderDirection,
    #[serde(rename = "stoponfirsterror")]
    pub stop_on_first_error: bool,
    #[serde(rename = "stoplooponerror")]
    pub stop_loop_on_error: bool,
    pub item: Option<ItemKind>,
    pub property: String,
    #[serde(rename = "in")]
    pub input: Option<String>,
    pub delim: Option<String>,
    #[serde(rename = "splitoption")]
    pub split_option: SplitOption,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Per-item template file.
    pub template: Option<PathBuf>,
    /// Only nodes in this namespace (or in none) run.
    pub namespace: Option<String>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_threads: 0,
            order_by: OrderBy::None,
            order_direction: OrderDirection::Ascending,
            stop_on_first_error: true,
            stop_loop_on_error: true,
            item: None,
            property: String::new(),
            input: None,
            delim: None,
            split_option: SplitOption::None,
            include: Vec::new(),
            exclude: Vec::new(),
            template: None,
            namespace: None,
        }
    }
}

/// A validated run: engine configuration plus where the items come from.
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub config: LoopConfig,
    pub source: SourceSpec,
    pub template: Option<PathBuf>,
}

impl LoopSettings {
    /// Validate the merged settings into engine configuration and a source.
    pub fn resolve(self) -> Result<ResolvedRun, LoopError> {
        let config = LoopConfig {
            max_threads: self.max_threads,
            order_by: self.order_by,
            order_direction: self.order_direction,
            stop_on_first_error: self.stop_on_first_error,
            stop_loop_on_error: self.stop_loop_on_error,
            property: self.property,
            namespace: self.namespace.filter(|ns| !ns.is_empty()),
        };
        config.validate()?;

        let source = SourceSpec::from_inputs(SourceInputs {
            item: self.item,
            input: self.input,
            delim: self.delim,
            split: self.split_option,
            include: self.include,
            exclude: self.exclude,
        })?;

        Ok(ResolvedRun {
            config,
            source,
            template: self.template,
        })
    }
}

/// Engine configuration for one for-each loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Upper bound on workers; 0 means one per core.
    pub max_threads: usize,
    pub order_by: OrderBy,
    pub order_direction: OrderDirection,
    pub stop_on_first_error: bool,
    pub stop_loop_on_error: bool,
    /// Loop variable name.
    pub property: String,
    pub namespace: Option<String>,
}

impl LoopConfig {
    /// Defaults for everything but the loop variable name.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            max_threads: 0,
            order_by: OrderBy::None,
            order_direction: OrderDirection::Ascending,
            stop_on_first_error: true,
            stop_loop_on_error: true,
            property: property.into(),
            namespace: None,
        }
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_order(mut self, order_by: OrderBy, direction: OrderDirection) -> Self {
        self.order_by = order_by;
        self.order_direction = direction;
        self
    }

    pub fn with_stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }

    pub fn with_stop_loop_on_error(mut self, stop: bool) -> Self {
        self.stop_loop_on_error = stop;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Worker ceiling after resolving 0 to the core count.
    pub fn effective_max_threads(&self) -> usize {
        ExecutionStrategy::calculate_max_workers(self.max_threads)
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        let property = self.property.trim();
        if property.is_empty() {
            return Err(LoopError::configuration("'property' must name the loop variable"));
        }
        if property.contains(['$', '{', '}']) {
            return Err(LoopError::configuration(format!(
                "'property' must be a plain name, got '{}'",
                self.property
            )));
        }
        Ok(())
    }

    pub fn stop_policy(&self) -> StopPolicy {
        StopPolicy {
            stop_on_first_error: self.stop_on_first_error,
            stop_loop_on_error: self.stop_loop_on_error,
        }
    }
}
