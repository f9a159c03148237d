//! # parloop - parallel for-each over files, folders, lines and tokens
//!
//! parloop resolves an ordered list of items, then runs a per-item template of
//! operations for every item across a bounded pool of worker threads. The item
//! value is bound to a loop variable and substituted into the template as
//! `${name}` before each operation runs.
//!
//! ## Quick Start
//!
//! ```bash
//! # Echo every token of a delimited string, one worker
//! parloop run --item string --in "a;b;c" --delim ";" --property value \
//!     --template per-item.yaml --maxthreads 1
//!
//! # Process every Rust file under src/, largest first
//! parloop run --item file --in src --include "**/*.rs" --property file \
//!     --orderby size --orderdirection descending --template per-item.yaml
//! ```
//!
//! ## Template Example
//!
//! ```yaml
//! do:
//!   - op: echo
//!     message: "processing ${file}"
//!   - op: set
//!     name: target
//!     value: "${file}.bak"
//!   - op: exec
//!     command: "cp ${file} ${target}"
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use parloop::config::LoopConfig;
//! use parloop::engine::ForEachEngine;
//! use parloop::operations::Registry;
//! use parloop::template::{Template, TemplateNode};
//!
//! let template = Template::new(
//!     TemplateNode::new("do").with_child(
//!         TemplateNode::new("echo").with_attribute("message", "hello ${name}"),
//!     ),
//! );
//! let engine = ForEachEngine::new(LoopConfig::new("name"), template, Registry::with_builtins());
//! let report = engine.run(vec!["world".to_string()])?;
//! assert_eq!(report.items_processed, 1);
//! # Ok::<(), parloop::error::LoopError>(())
//! ```

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod operations;
pub mod parallel;
pub mod scope;
pub mod sequencer;
pub mod source;
pub mod template;

pub use config::LoopConfig;
pub use engine::{ForEachEngine, RunReport};
pub use error::LoopError;

/// Result type alias for application-level operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
