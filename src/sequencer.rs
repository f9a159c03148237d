//! Ordering of the resolved item list before dispatch.
//!
//! Sorting is stable. A descending order is the exact reverse of the ascending
//! result, so items that compare equal come out in reverse input order.

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoopError;

/// Sort criterion for the item list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    /// Keep the order the source produced.
    #[default]
    None,
    /// Final path segment, case-insensitive.
    Name,
    /// Byte length of the referenced file.
    Size,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

enum SortKey {
    Name(String),
    Size(u64),
}

impl SortKey {
    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Name(a), SortKey::Name(b)) => a.cmp(b),
            (SortKey::Size(a), SortKey::Size(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Sorts the resolved items into the immutable dispatch order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequencer {
    order_by: OrderBy,
    direction: OrderDirection,
}

impl Sequencer {
    pub fn new(order_by: OrderBy, direction: OrderDirection) -> Self {
        Self {
            order_by,
            direction,
        }
    }

    pub fn sequence(&self, items: Vec<String>) -> Result<Vec<String>, LoopError> {
        if self.order_by == OrderBy::None {
            // Direction only applies to a sorted list
            return Ok(items);
        }

        let mut keyed = items
            .into_iter()
            .map(|item| Ok((self.key_for(&item)?, item)))
            .collect::<Result<Vec<_>, LoopError>>()?;

        keyed.sort_by(|(a, _), (b, _)| a.compare(b));

        let mut ordered: Vec<String> = keyed.into_iter().map(|(_, item)| item).collect();
        if self.direction == OrderDirection::Descending {
            ordered.reverse();
        }

        tracing::debug!(
            "Sequenced {} items by {:?} ({:?})",
            ordered.len(),
            self.order_by,
            self.direction
        );
        Ok(ordered)
    }

    fn key_for(&self, item: &str) -> Result<SortKey, LoopError> {
        match self.order_by {
            OrderBy::None => Ok(SortKey::Name(String::new())),
            OrderBy::Name => Ok(SortKey::Name(final_segment(item).to_lowercase())),
            OrderBy::Size => std::fs::metadata(item)
                .map(|meta| SortKey::Size(meta.len()))
                .map_err(|e| {
                    LoopError::configuration(format!(
                        "cannot order by size, '{item}' is not readable: {e}"
                    ))
                }),
        }
    }
}

fn final_segment(item: &str) -> String {
    Path::new(item)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| item.to_string())
}
