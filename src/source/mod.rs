//! Item source providers
//!
//! Exactly one source mode feeds the loop:
//!
//! | `item`   | `in`            | produces                                    |
//! |----------|-----------------|---------------------------------------------|
//! | `file`   | base directory  | files matching `include` minus `exclude`    |
//! | `folder` | base directory  | directories matching `include` minus `exclude` |
//! | `line`   | text file       | one item per line                           |
//! | `string` | delimited text  | tokens split on `delim`                     |
//!
//! Missing or conflicting inputs are configuration errors raised before any
//! worker starts.

mod fileset;
mod text;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::LoopError;

pub use fileset::{FileSet, FileSetTarget};
pub use text::{read_lines, split_tokens};

/// Which kind of item the loop iterates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
    Line,
    String,
}

/// How empty tokens are handled in `string` mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitOption {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "removeEmptyEntries", alias = "remove-empty-entries", alias = "removeemptyentries")]
    RemoveEmptyEntries,
}

/// Raw source inputs, as they come out of configuration.
#[derive(Debug, Clone, Default)]
pub struct SourceInputs {
    pub item: Option<ItemKind>,
    pub input: Option<String>,
    pub delim: Option<String>,
    pub split: SplitOption,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// A validated item source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Files(FileSet),
    Folders(FileSet),
    Lines { path: PathBuf },
    Tokens { text: String, delimiter: String, split: SplitOption },
}

impl SourceSpec {
    /// Validate raw inputs into exactly one source mode.
    pub fn from_inputs(inputs: SourceInputs) -> Result<Self, LoopError> {
        let item = inputs.item.ok_or_else(|| {
            LoopError::configuration("no item source given: set 'item' to file, folder, line or string")
        })?;
        // An empty string is valid token data; paths must not be empty.
        let input = inputs
            .input
            .filter(|value| item == ItemKind::String || !value.is_empty())
            .ok_or_else(|| LoopError::configuration(format!("'{}' items need an 'in' value", item_label(item))))?;

        let uses_patterns = !inputs.include.is_empty() || !inputs.exclude.is_empty();
        let uses_delimiter = inputs.delim.is_some() || inputs.split != SplitOption::None;

        match item {
            ItemKind::File | ItemKind::Folder => {
                if uses_delimiter {
                    return Err(conflict(item, "'delim'/'splitoption'"));
                }
                let target = if item == ItemKind::File {
                    FileSetTarget::Files
                } else {
                    FileSetTarget::Folders
                };
                let set = FileSet::new(input, inputs.include, inputs.exclude, target);
                Ok(match item {
                    ItemKind::File => SourceSpec::Files(set),
                    _ => SourceSpec::Folders(set),
                })
            }
            ItemKind::Line => {
                if uses_delimiter {
                    return Err(conflict(item, "'delim'/'splitoption'"));
                }
                if uses_patterns {
                    return Err(conflict(item, "'include'/'exclude'"));
                }
                Ok(SourceSpec::Lines {
                    path: PathBuf::from(input),
                })
            }
            ItemKind::String => {
                if uses_patterns {
                    return Err(conflict(item, "'include'/'exclude'"));
                }
                let delimiter = inputs
                    .delim
                    .filter(|d| !d.is_empty())
                    .ok_or_else(|| LoopError::configuration("'string' items need a non-empty 'delim'"))?;
                Ok(SourceSpec::Tokens {
                    text: input,
                    delimiter,
                    split: inputs.split,
                })
            }
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            SourceSpec::Files(_) => ItemKind::File,
            SourceSpec::Folders(_) => ItemKind::Folder,
            SourceSpec::Lines { .. } => ItemKind::Line,
            SourceSpec::Tokens { .. } => ItemKind::String,
        }
    }

    /// Produce the item list, in source order.
    pub fn resolve(&self) -> Result<Vec<String>, LoopError> {
        let items = match self {
            SourceSpec::Files(set) | SourceSpec::Folders(set) => set.resolve()?,
            SourceSpec::Lines { path } => read_lines(path)?,
            SourceSpec::Tokens {
                text,
                delimiter,
                split,
            } => split_tokens(text, delimiter, *split),
        };
        tracing::debug!("Resolved {} {} items", items.len(), item_label(self.kind()));
        Ok(items)
    }
}

fn item_label(item: ItemKind) -> &'static str {
    match item {
        ItemKind::File => "file",
        ItemKind::Folder => "folder",
        ItemKind::Line => "line",
        ItemKind::String => "string",
    }
}

fn conflict(item: ItemKind, offending: &str) -> LoopError {
    LoopError::configuration(format!(
        "conflicting item sources: {offending} cannot be used with '{}' items",
        item_label(item)
    ))
}
