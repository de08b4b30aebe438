//! Database operations for the FAQ page.

use chrono::{DateTime, Utc};
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;

use showcase_core::{FaqItemId, PageId};

use super::children::{ChildRow, ChildTable, insert_children, replace_children};
use super::singleton::{ensure_absent, lock_page};
use super::{RepositoryError, Storage};
use crate::input::InputWarning;
use crate::models::common::Saved;
use crate::models::pages::{Faq, FaqInput, FaqItem, FaqItemInput};

const TABLE: &str = "catalog.faq";

const ITEMS: ChildTable = ChildTable {
    table: "catalog.faq_item",
    parent_column: "faq_id",
    columns: "question, answer",
};

impl ChildRow for FaqItemInput {
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.question.trim().to_string());
        row.push_bind(self.answer.trim().to_string());
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FaqRow {
    id: i32,
    title: String,
    version: i32,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct FaqItemRow {
    id: i32,
    question: String,
    answer: String,
    order_index: i32,
}

impl From<FaqItemRow> for FaqItem {
    fn from(row: FaqItemRow) -> Self {
        Self {
            id: FaqItemId::new(row.id),
            question: row.question,
            answer: row.answer,
            order_index: row.order_index,
        }
    }
}

/// Repository for the FAQ page.
pub struct FaqRepository<'a> {
    storage: &'a Storage,
}

impl<'a> FaqRepository<'a> {
    /// Create a new FAQ repository.
    #[must_use]
    pub const fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Get the FAQ page with its items in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Option<Faq>, RepositoryError> {
        let pool = self.storage.pool();

        let Some(root) = sqlx::query_as::<_, FaqRow>(
            "SELECT id, title, version, updated_at FROM catalog.faq ORDER BY id LIMIT 1",
        )
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, FaqItemRow>(
            r"
            SELECT id, question, answer, order_index
            FROM catalog.faq_item
            WHERE faq_id = $1
            ORDER BY order_index, id
            ",
        )
        .bind(root.id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        Ok(Some(Faq {
            id: PageId::new(root.id),
            title: root.title,
            version: root.version,
            items,
            updated_at: root.updated_at,
        }))
    }

    /// Create the FAQ page when none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the page already exists, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(items = input.items.len()))]
    pub async fn create(
        &self,
        input: FaqInput,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Faq>, RepositoryError> {
        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    ensure_absent(&mut *conn, TABLE).await?;

                    let id: i32 =
                        sqlx::query_scalar("INSERT INTO catalog.faq (title) VALUES ($1) RETURNING id")
                            .bind(&input.title)
                            .fetch_one(&mut *conn)
                            .await?;

                    insert_children(&mut *conn, &ITEMS, id, 0, &input.items).await?;
                    Ok::<_, RepositoryError>(())
                })
            })
            .await?;

        tracing::info!("faq page created");
        self.saved(warnings).await
    }

    /// Replace the FAQ title and its whole item list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the page row is missing,
    /// `RepositoryError::Conflict` on a stale `expected_version`, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(items = input.items.len()))]
    pub async fn update(
        &self,
        input: FaqInput,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Faq>, RepositoryError> {
        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let id = lock_page(&mut *conn, TABLE, input.expected_version).await?;

                    sqlx::query(
                        "UPDATE catalog.faq SET title = $2, version = version + 1 WHERE id = $1",
                    )
                    .bind(id)
                    .bind(&input.title)
                    .execute(&mut *conn)
                    .await?;

                    replace_children(&mut *conn, &ITEMS, id, &input.items).await?;
                    Ok::<_, RepositoryError>(())
                })
            })
            .await?;

        tracing::info!("faq page updated");
        self.saved(warnings).await
    }

    async fn saved(&self, warnings: Vec<InputWarning>) -> Result<Saved<Faq>, RepositoryError> {
        let faq = self.fetch().await?.ok_or(RepositoryError::NotFound)?;
        Ok(Saved::new(faq, warnings))
    }
}
