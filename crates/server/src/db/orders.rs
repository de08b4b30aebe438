//! Database operations for orders.
//!
//! Line items are written once, inside the transaction that creates the
//! order, and never modified afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;
use sqlx::{PgExecutor, QueryBuilder};

use showcase_core::{OrderId, OrderItemId, OrderStatus, ProductId};

use super::children::{ChildRow, ChildTable, insert_children};
use super::{RepositoryError, Storage};
use crate::models::common::Page;
use crate::models::order::{NewOrder, NewOrderItem, Order, OrderFilter, OrderItem};
use crate::projection::group_by_parent;

const ITEMS: ChildTable = ChildTable {
    table: "catalog.order_item",
    parent_column: "order_id",
    columns: "product_id, product_name, price, quantity, engraving",
};

impl ChildRow for NewOrderItem {
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.product_id);
        row.push_bind(self.product_name.clone());
        row.push_bind(self.price);
        row.push_bind(self.quantity);
        row.push_bind(self.engraving.clone());
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    status: OrderStatus,
    customer_name: String,
    phone: String,
    email: Option<String>,
    address: Option<String>,
    comment: Option<String>,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            status: self.status,
            customer_name: self.customer_name,
            phone: self.phone,
            email: self.email,
            address: self.address,
            comment: self.comment,
            total_amount: self.total_amount,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: Option<i32>,
    product_name: String,
    price: Decimal,
    quantity: i32,
    engraving: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            product_id: row.product_id.map(ProductId::new),
            product_name: row.product_name,
            price: row.price,
            quantity: row.quantity,
            engraving: row.engraving,
        }
    }
}

const ORDER_COLUMNS: &str = "id, status, customer_name, phone, email, address, comment, \
                             total_amount, created_at, updated_at";

/// Append the shared `WHERE` clause of the listing and its count.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        builder.push(" WHERE status = ").push_bind(status);
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders.
pub struct OrderRepository<'a> {
    storage: &'a Storage,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Place an order: the root with status `new` and one frozen row per
    /// cart line, in one transaction.
    ///
    /// The caller validates the order first (see [`NewOrder::validate`]).
    /// `total_amount` is stored as given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(items = order.items.len()))]
    pub async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let id = self
            .storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let id: i32 = sqlx::query_scalar(
                        r#"
                        INSERT INTO catalog."order"
                            (status, customer_name, phone, email, address, comment, total_amount)
                        VALUES ($1, $2, $3, $4, $5, $6, $7)
                        RETURNING id
                        "#,
                    )
                    .bind(OrderStatus::New)
                    .bind(&order.customer_name)
                    .bind(&order.phone)
                    .bind(&order.email)
                    .bind(&order.address)
                    .bind(&order.comment)
                    .bind(order.total_amount)
                    .fetch_one(&mut *conn)
                    .await?;

                    insert_children(&mut *conn, &ITEMS, id, 0, &order.items).await?;

                    Ok::<_, RepositoryError>(OrderId::new(id))
                })
            })
            .await?;

        tracing::info!(order_id = %id, "order placed");
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let pool = self.storage.pool();

        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM catalog."order" WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let items = fetch_items(pool, &[id.as_i32()])
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(Some(row.into_order(items)))
    }

    /// List orders newest first, optionally filtered by status.
    ///
    /// Items for the whole page are loaded with one query and grouped in
    /// process.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn find_all(&self, filter: &OrderFilter) -> Result<Page<Order>, RepositoryError> {
        let pool = self.storage.pool();
        let pagination = filter.pagination();

        let mut count = QueryBuilder::<Postgres>::new(r#"SELECT COUNT(*) FROM catalog."order""#);
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            r#"SELECT {ORDER_COLUMNS} FROM catalog."order""#
        ));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let rows: Vec<OrderRow> = select.build_query_as().fetch_all(pool).await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut items_by_order = group_by_parent(fetch_items(pool, &ids).await?, |i| i.order_id);

        let orders = rows
            .into_iter()
            .map(|row| {
                let items = items_by_order
                    .remove(&row.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Into::into)
                    .collect();
                row.into_order(items)
            })
            .collect();

        Ok(Page::new(orders, total, pagination))
    }

    /// Overwrite the order status.
    ///
    /// Every transition is accepted. Moving an order out of `completed` or
    /// `rejected` is logged at warn level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        // The CTE reads the row before the update, so the previous status
        // comes back alongside the write.
        let previous: OrderStatus = sqlx::query_scalar(
            r#"
            WITH previous AS (SELECT status FROM catalog."order" WHERE id = $1 FOR UPDATE)
            UPDATE catalog."order" o
            SET status = $2
            FROM previous
            WHERE o.id = $1
            RETURNING previous.status
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(self.storage.pool())
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if previous.is_terminal() && previous != status {
            tracing::warn!(
                order_id = %id,
                from = %previous,
                to = %status,
                "order moved out of a terminal status"
            );
        } else if !previous.follows_lifecycle(status) && previous != status {
            tracing::info!(order_id = %id, from = %previous, to = %status, "out-of-sequence status change");
        } else {
            tracing::info!(order_id = %id, from = %previous, to = %status, "order status changed");
        }

        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete an order; items cascade.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order was deleted.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let deleted = sqlx::query(r#"DELETE FROM catalog."order" WHERE id = $1"#)
            .bind(id)
            .execute(self.storage.pool())
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(order_id = %id, "order deleted");
        Ok(())
    }
}

async fn fetch_items<'e>(
    executor: impl PgExecutor<'e>,
    order_ids: &[i32],
) -> Result<Vec<OrderItemRow>, sqlx::Error> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, order_id, product_id, product_name, price, quantity, engraving
        FROM catalog.order_item
        WHERE order_id = ANY($1)
        ORDER BY order_id, order_index, id
        ",
    )
    .bind(order_ids)
    .fetch_all(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_adds_where_only_with_status() {
        let mut unfiltered = QueryBuilder::<Postgres>::new(r#"SELECT COUNT(*) FROM catalog."order""#);
        push_filter(&mut unfiltered, &OrderFilter::default());
        assert_eq!(unfiltered.sql(), r#"SELECT COUNT(*) FROM catalog."order""#);

        let mut filtered = QueryBuilder::<Postgres>::new(r#"SELECT COUNT(*) FROM catalog."order""#);
        push_filter(
            &mut filtered,
            &OrderFilter {
                status: Some(OrderStatus::Rejected),
                ..OrderFilter::default()
            },
        );
        assert_eq!(
            filtered.sql(),
            r#"SELECT COUNT(*) FROM catalog."order" WHERE status = $1"#
        );
    }
}
