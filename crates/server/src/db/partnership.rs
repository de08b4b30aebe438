//! Database operations for the partnership page: text blocks plus a gallery
//! of uploaded images.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;

use showcase_core::{PageId, PartnershipImageId};

use super::children::{
    self, ChildRow, ChildTable, FileTable, edit_file_collection, insert_children,
    replace_children,
};
use super::singleton::{ensure_absent, lock_page, settle_files};
use super::{RepositoryError, Storage};
use crate::files::{FileStore, StoredFile};
use crate::input::InputWarning;
use crate::models::common::Saved;
use crate::models::pages::{Partnership, PartnershipImage, PartnershipInput};

const TABLE: &str = "catalog.partnership";

const BLOCKS: ChildTable = ChildTable {
    table: "catalog.partnership_block",
    parent_column: "partnership_id",
    columns: "title, content",
};

const IMAGES: FileTable = FileTable {
    rows: ChildTable {
        table: "catalog.partnership_image",
        parent_column: "partnership_id",
        columns: "image_url",
    },
    url_column: "image_url",
};

struct NewImage(String);

impl ChildRow for NewImage {
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.0.clone());
    }
}

fn new_images(uploads: &[StoredFile]) -> Vec<NewImage> {
    uploads.iter().map(|u| NewImage(u.url.clone())).collect()
}

#[derive(Debug, sqlx::FromRow)]
struct PartnershipRow {
    id: i32,
    title: String,
    description: String,
    version: i32,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: i32,
    image_url: String,
    order_index: i32,
}

impl From<ImageRow> for PartnershipImage {
    fn from(row: ImageRow) -> Self {
        Self {
            id: PartnershipImageId::new(row.id),
            image_url: row.image_url,
            order_index: row.order_index,
        }
    }
}

/// Repository for the partnership page.
pub struct PartnershipRepository<'a> {
    storage: &'a Storage,
    files: &'a FileStore,
}

impl<'a> PartnershipRepository<'a> {
    /// Create a new partnership page repository.
    #[must_use]
    pub const fn new(storage: &'a Storage, files: &'a FileStore) -> Self {
        Self { storage, files }
    }

    /// Get the partnership page with its blocks and images.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Option<Partnership>, RepositoryError> {
        let pool = self.storage.pool();

        let Some(root) = sqlx::query_as::<_, PartnershipRow>(
            "SELECT id, title, description, version, updated_at FROM catalog.partnership ORDER BY id LIMIT 1",
        )
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let blocks = children::fetch_blocks(pool, &BLOCKS, root.id).await?;
        let images = fetch_images(pool, root.id).await?;

        Ok(Some(Partnership {
            id: PageId::new(root.id),
            title: root.title,
            description: root.description,
            version: root.version,
            blocks,
            images,
            updated_at: root.updated_at,
        }))
    }

    /// Create the partnership page when none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the page already exists, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(uploads = uploads.len()))]
    pub async fn create(
        &self,
        input: PartnershipInput,
        uploads: Vec<StoredFile>,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Partnership>, RepositoryError> {
        let images = new_images(&uploads);

        let write = self.storage.with_transaction(move |conn| {
            Box::pin(async move {
                ensure_absent(&mut *conn, TABLE).await?;

                let id: i32 = sqlx::query_scalar(
                    "INSERT INTO catalog.partnership (title, description) VALUES ($1, $2) RETURNING id",
                )
                .bind(&input.title)
                .bind(&input.description)
                .fetch_one(&mut *conn)
                .await?;

                insert_children(&mut *conn, &BLOCKS, id, 0, &input.blocks).await?;
                insert_children(&mut *conn, &IMAGES.rows, id, 0, &images).await?;
                Ok::<_, RepositoryError>(Vec::<String>::new())
            })
        });
        settle_files(self.files, &uploads, write).await?;

        tracing::info!("partnership page created");
        self.saved(warnings).await
    }

    /// Replace the page text and blocks, delete the listed images and append
    /// uploaded ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the page row is missing,
    /// `RepositoryError::Conflict` on a stale `expected_version`, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(
        skip_all,
        fields(deleted = input.deleted_image_ids.len(), uploads = uploads.len())
    )]
    pub async fn update(
        &self,
        input: PartnershipInput,
        uploads: Vec<StoredFile>,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Partnership>, RepositoryError> {
        let images = new_images(&uploads);

        let write = self.storage.with_transaction(move |conn| {
            Box::pin(async move {
                let id = lock_page(&mut *conn, TABLE, input.expected_version).await?;

                sqlx::query(
                    r"
                    UPDATE catalog.partnership
                    SET title = $2, description = $3, version = version + 1
                    WHERE id = $1
                    ",
                )
                .bind(id)
                .bind(&input.title)
                .bind(&input.description)
                .execute(&mut *conn)
                .await?;

                replace_children(&mut *conn, &BLOCKS, id, &input.blocks).await?;

                let deleted: Vec<i32> = input.deleted_image_ids.iter().map(|i| i.as_i32()).collect();
                let edit = edit_file_collection(&mut *conn, &IMAGES, id, &deleted, &images).await?;

                Ok::<_, RepositoryError>(edit.removed_urls)
            })
        });
        settle_files(self.files, &uploads, write).await?;

        tracing::info!("partnership page updated");
        self.saved(warnings).await
    }

    async fn saved(
        &self,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Partnership>, RepositoryError> {
        let page = self.fetch().await?.ok_or(RepositoryError::NotFound)?;
        Ok(Saved::new(page, warnings))
    }
}

async fn fetch_images<'e>(
    executor: impl PgExecutor<'e>,
    partnership_id: i32,
) -> Result<Vec<PartnershipImage>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ImageRow>(
        r"
        SELECT id, image_url, order_index
        FROM catalog.partnership_image
        WHERE partnership_id = $1
        ORDER BY order_index, id
        ",
    )
    .bind(partnership_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
