//! Order status lifecycle.
//!
//! ```text
//! new ──> shipped ──> completed
//!  │
//!  └────> rejected
//! ```
//!
//! Status changes are plain overwrites: the backend does not refuse a move
//! from one state to any other (for example `rejected -> completed`).
//! [`OrderStatus::is_terminal`] lets callers log when a finished order is
//! reopened.

use serde::{Deserialize, Serialize};

/// Order status, stored as the `catalog.order_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "catalog.order_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Freshly placed, not yet handled.
    #[default]
    New,
    /// Handed over to delivery.
    Shipped,
    /// Delivered and closed.
    Completed,
    /// Declined by the shop.
    Rejected,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 4] = [Self::New, Self::Shipped, Self::Completed, Self::Rejected];

    /// Whether the status ends the lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Whether the move follows the documented lifecycle edges.
    ///
    /// Informational only; `update_status` accepts every transition.
    #[must_use]
    pub const fn follows_lifecycle(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Shipped | Self::Rejected) | (Self::Shipped, Self::Completed)
        )
    }

    /// Lowercase name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}
