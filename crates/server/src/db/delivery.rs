//! Database operations for the delivery page.
//!
//! Each region stores its destinations as a versioned JSONB list. A list that
//! no longer decodes is logged and read back as empty.

use chrono::{DateTime, Utc};
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;
use sqlx::types::Json;

use showcase_core::{Destination, PageId, RegionId, Versioned};

use super::children::{ChildRow, ChildTable, insert_children, replace_children};
use super::singleton::{ensure_absent, lock_page};
use super::{RepositoryError, Storage};
use crate::input::InputWarning;
use crate::models::common::Saved;
use crate::models::pages::{Delivery, DeliveryInput, DeliveryRegion, RegionInput};

const TABLE: &str = "catalog.delivery";

const REGIONS: ChildTable = ChildTable {
    table: "catalog.delivery_region",
    parent_column: "delivery_id",
    columns: "name, destinations",
};

impl ChildRow for RegionInput {
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.name.trim().to_string());
        row.push_bind(Json(Versioned::encode(&self.destinations)));
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: i32,
    title: String,
    description: String,
    version: i32,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct RegionRow {
    id: i32,
    name: String,
    destinations: Json<serde_json::Value>,
    order_index: i32,
}

impl From<RegionRow> for DeliveryRegion {
    fn from(row: RegionRow) -> Self {
        let destinations = Versioned::<Vec<Destination>>::decode(row.destinations.0)
            .unwrap_or_else(|error| {
                tracing::warn!(region_id = row.id, %error, "undecodable delivery destinations");
                Vec::new()
            });

        Self {
            id: RegionId::new(row.id),
            name: row.name,
            destinations,
            order_index: row.order_index,
        }
    }
}

/// Repository for the delivery page.
pub struct DeliveryRepository<'a> {
    storage: &'a Storage,
}

impl<'a> DeliveryRepository<'a> {
    /// Create a new delivery page repository.
    #[must_use]
    pub const fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Get the delivery page with its regions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Option<Delivery>, RepositoryError> {
        let pool = self.storage.pool();

        let Some(root) = sqlx::query_as::<_, DeliveryRow>(
            "SELECT id, title, description, version, updated_at FROM catalog.delivery ORDER BY id LIMIT 1",
        )
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let regions = sqlx::query_as::<_, RegionRow>(
            r"
            SELECT id, name, destinations, order_index
            FROM catalog.delivery_region
            WHERE delivery_id = $1
            ORDER BY order_index, id
            ",
        )
        .bind(root.id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        Ok(Some(Delivery {
            id: PageId::new(root.id),
            title: root.title,
            description: root.description,
            version: root.version,
            regions,
            updated_at: root.updated_at,
        }))
    }

    /// Create the delivery page when none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the page already exists, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(regions = input.regions.len()))]
    pub async fn create(
        &self,
        input: DeliveryInput,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Delivery>, RepositoryError> {
        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    ensure_absent(&mut *conn, TABLE).await?;

                    let id: i32 = sqlx::query_scalar(
                        "INSERT INTO catalog.delivery (title, description) VALUES ($1, $2) RETURNING id",
                    )
                    .bind(&input.title)
                    .bind(&input.description)
                    .fetch_one(&mut *conn)
                    .await?;

                    insert_children(&mut *conn, &REGIONS, id, 0, &input.regions).await?;
                    Ok::<_, RepositoryError>(())
                })
            })
            .await?;

        tracing::info!("delivery page created");
        self.saved(warnings).await
    }

    /// Replace the page text and the whole region list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the page row is missing,
    /// `RepositoryError::Conflict` on a stale `expected_version`, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(regions = input.regions.len()))]
    pub async fn update(
        &self,
        input: DeliveryInput,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Delivery>, RepositoryError> {
        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let id = lock_page(&mut *conn, TABLE, input.expected_version).await?;

                    sqlx::query(
                        r"
                        UPDATE catalog.delivery
                        SET title = $2, description = $3, version = version + 1
                        WHERE id = $1
                        ",
                    )
                    .bind(id)
                    .bind(&input.title)
                    .bind(&input.description)
                    .execute(&mut *conn)
                    .await?;

                    replace_children(&mut *conn, &REGIONS, id, &input.regions).await?;
                    Ok::<_, RepositoryError>(())
                })
            })
            .await?;

        tracing::info!("delivery page updated");
        self.saved(warnings).await
    }

    async fn saved(&self, warnings: Vec<InputWarning>) -> Result<Saved<Delivery>, RepositoryError> {
        let delivery = self.fetch().await?.ok_or(RepositoryError::NotFound)?;
        Ok(Saved::new(delivery, warnings))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_region_decodes_destinations() {
        let stored = Versioned::encode(&vec![Destination {
            name: "Almaty".to_string(),
            price: Decimal::new(150_000, 2),
            term: "1-2 days".to_string(),
        }]);
        let region = DeliveryRegion::from(RegionRow {
            id: 1,
            name: "South".to_string(),
            destinations: Json(stored),
            order_index: 0,
        });
        assert_eq!(region.destinations.len(), 1);
    }

    #[test]
    fn test_region_with_broken_destinations_reads_as_empty() {
        let region = DeliveryRegion::from(RegionRow {
            id: 2,
            name: "North".to_string(),
            destinations: Json(serde_json::json!([{"city": "Astana"}])),
            order_index: 1,
        });
        assert!(region.destinations.is_empty());
        assert_eq!(region.name, "North");
    }
}
