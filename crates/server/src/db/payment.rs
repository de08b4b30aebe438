//! Database operations for the payment page.
//!
//! Each method's format is a [`PaymentFormat`] stored in a versioned JSONB
//! envelope. A document that no longer decodes is logged and read back as
//! `None` so the rest of the page still renders.

use chrono::{DateTime, Utc};
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;
use sqlx::types::Json;

use showcase_core::{PageId, PaymentFormat, PaymentMethodId, Versioned};

use super::children::{self, ChildRow, ChildTable, insert_children, replace_children};
use super::singleton::{ensure_absent, lock_page};
use super::{RepositoryError, Storage};
use crate::input::InputWarning;
use crate::models::common::Saved;
use crate::models::pages::{Payment, PaymentInput, PaymentMethod, PaymentMethodInput};

const TABLE: &str = "catalog.payment";

const METHODS: ChildTable = ChildTable {
    table: "catalog.payment_method",
    parent_column: "payment_id",
    columns: "name, format",
};

const DESCRIPTIONS: ChildTable = ChildTable {
    table: "catalog.payment_description",
    parent_column: "payment_id",
    columns: "title, content",
};

impl ChildRow for PaymentMethodInput {
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.name.trim().to_string());
        row.push_bind(Json(Versioned::encode(&self.format)));
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i32,
    title: String,
    description: String,
    version: i32,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct MethodRow {
    id: i32,
    name: String,
    format: Json<serde_json::Value>,
    order_index: i32,
}

impl From<MethodRow> for PaymentMethod {
    fn from(row: MethodRow) -> Self {
        let format = match Versioned::<PaymentFormat>::decode(row.format.0) {
            Ok(format) => Some(format),
            Err(error) => {
                tracing::warn!(method_id = row.id, %error, "undecodable payment format");
                None
            }
        };

        Self {
            id: PaymentMethodId::new(row.id),
            name: row.name,
            format,
            order_index: row.order_index,
        }
    }
}

/// Repository for the payment page.
pub struct PaymentRepository<'a> {
    storage: &'a Storage,
}

impl<'a> PaymentRepository<'a> {
    /// Create a new payment page repository.
    #[must_use]
    pub const fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Get the payment page with its methods and descriptions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Option<Payment>, RepositoryError> {
        let pool = self.storage.pool();

        let Some(root) = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, title, description, version, updated_at FROM catalog.payment ORDER BY id LIMIT 1",
        )
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let methods = sqlx::query_as::<_, MethodRow>(
            r"
            SELECT id, name, format, order_index
            FROM catalog.payment_method
            WHERE payment_id = $1
            ORDER BY order_index, id
            ",
        )
        .bind(root.id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let descriptions = children::fetch_blocks(pool, &DESCRIPTIONS, root.id).await?;

        Ok(Some(Payment {
            id: PageId::new(root.id),
            title: root.title,
            description: root.description,
            version: root.version,
            methods,
            descriptions,
            updated_at: root.updated_at,
        }))
    }

    /// Create the payment page when none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the page already exists, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(methods = input.methods.len()))]
    pub async fn create(
        &self,
        input: PaymentInput,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Payment>, RepositoryError> {
        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    ensure_absent(&mut *conn, TABLE).await?;

                    let id: i32 = sqlx::query_scalar(
                        "INSERT INTO catalog.payment (title, description) VALUES ($1, $2) RETURNING id",
                    )
                    .bind(&input.title)
                    .bind(&input.description)
                    .fetch_one(&mut *conn)
                    .await?;

                    insert_children(&mut *conn, &METHODS, id, 0, &input.methods).await?;
                    insert_children(&mut *conn, &DESCRIPTIONS, id, 0, &input.descriptions).await?;
                    Ok::<_, RepositoryError>(())
                })
            })
            .await?;

        tracing::info!("payment page created");
        self.saved(warnings).await
    }

    /// Replace the page text, methods and descriptions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the page row is missing,
    /// `RepositoryError::Conflict` on a stale `expected_version`, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(methods = input.methods.len()))]
    pub async fn update(
        &self,
        input: PaymentInput,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Payment>, RepositoryError> {
        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let id = lock_page(&mut *conn, TABLE, input.expected_version).await?;

                    sqlx::query(
                        r"
                        UPDATE catalog.payment
                        SET title = $2, description = $3, version = version + 1
                        WHERE id = $1
                        ",
                    )
                    .bind(id)
                    .bind(&input.title)
                    .bind(&input.description)
                    .execute(&mut *conn)
                    .await?;

                    replace_children(&mut *conn, &METHODS, id, &input.methods).await?;
                    replace_children(&mut *conn, &DESCRIPTIONS, id, &input.descriptions).await?;
                    Ok::<_, RepositoryError>(())
                })
            })
            .await?;

        tracing::info!("payment page updated");
        self.saved(warnings).await
    }

    async fn saved(&self, warnings: Vec<InputWarning>) -> Result<Saved<Payment>, RepositoryError> {
        let payment = self.fetch().await?.ok_or(RepositoryError::NotFound)?;
        Ok(Saved::new(payment, warnings))
    }
}
