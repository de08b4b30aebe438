//! Types shared by several aggregates.

use serde::{Deserialize, Serialize};

use showcase_core::BlockId;

use crate::input::InputWarning;
use crate::projection::IndexedChild;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// A titled text block inside a description collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: BlockId,
    pub title: String,
    pub content: String,
    pub order_index: i32,
}

impl IndexedChild for ContentBlock {
    type Id = BlockId;

    fn child_id(&self) -> BlockId {
        self.id
    }

    fn order_index(&self) -> i32 {
        self.order_index
    }
}

/// A block as submitted; its position in the list becomes its order index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BlockInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl BlockInput {
    /// Whether both title and content are blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }
}

/// Drop blocks the editor left completely empty.
#[must_use]
pub fn non_blank_blocks(blocks: Vec<BlockInput>) -> Vec<BlockInput> {
    blocks.into_iter().filter(|b| !b.is_blank()).collect()
}

/// Result of a write: the freshly read aggregate plus tolerated input problems.
#[derive(Debug, Clone, Serialize)]
pub struct Saved<A> {
    #[serde(rename = "data")]
    pub aggregate: A,
    pub warnings: Vec<InputWarning>,
}

impl<A> Saved<A> {
    #[must_use]
    pub const fn new(aggregate: A, warnings: Vec<InputWarning>) -> Self {
        Self {
            aggregate,
            warnings,
        }
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    /// Build from optional query parameters.
    #[must_use]
    pub fn from_query(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or_else(default_page),
            per_page: per_page.unwrap_or_else(default_per_page),
        }
    }

    /// Page size clamped to `1..=100`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, MAX_PER_PAGE))
    }

    /// Rows to skip; page 0 is treated as page 1.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page.max(1),
            per_page: pagination.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    #[must_use]
    pub fn total_pages(&self) -> i64 {
        let per_page = i64::from(self.per_page.max(1));
        (self.total + per_page - 1) / per_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination {
            page: 0,
            per_page: 1000,
        };
        assert_eq!(p.limit(), 100);
        assert_eq!(p.offset(), 0);

        let p = Pagination {
            page: 3,
            per_page: 20,
        };
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn test_total_pages() {
        let page: Page<()> = Page::new(vec![], 41, Pagination::default());
        assert_eq!(page.total_pages(), 3);
        let empty: Page<()> = Page::new(vec![], 0, Pagination::default());
        assert_eq!(empty.total_pages(), 0);
    }

    #[test]
    fn test_non_blank_blocks() {
        let blocks = vec![
            BlockInput {
                title: " ".into(),
                content: String::new(),
            },
            BlockInput {
                title: "Care".into(),
                content: String::new(),
            },
        ];
        assert_eq!(non_blank_blocks(blocks).len(), 1);
    }

    #[test]
    fn test_saved_serializes_as_data_and_warnings() {
        let saved = Saved::new(5, vec![]);
        let json = serde_json::to_value(&saved).ok();
        assert_eq!(json, Some(serde_json::json!({"data": 5, "warnings": []})));
    }
}
