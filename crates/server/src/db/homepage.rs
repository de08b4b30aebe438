//! Database operations for the homepage and its carousel.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;

use showcase_core::{CarouselItemId, PageId};

use super::children::{ChildRow, ChildTable, FileTable, edit_file_collection, insert_children};
use super::singleton::{ensure_absent, lock_page, settle_files};
use super::{RepositoryError, Storage};
use crate::files::{FileStore, StoredFile};
use crate::input::InputWarning;
use crate::models::common::Saved;
use crate::models::pages::{CarouselItem, Homepage, HomepageInput, SlideCaption};

const TABLE: &str = "catalog.homepage";

const CAROUSEL: FileTable = FileTable {
    rows: ChildTable {
        table: "catalog.homepage_carousel_item",
        parent_column: "homepage_id",
        columns: "image_url, caption, link_url",
    },
    url_column: "image_url",
};

struct NewSlide {
    image_url: String,
    caption: SlideCaption,
}

impl ChildRow for NewSlide {
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.image_url.clone());
        row.push_bind(self.caption.caption.clone());
        row.push_bind(self.caption.link_url.clone());
    }
}

fn new_slides(uploads: &[StoredFile], captions: &[SlideCaption]) -> Vec<NewSlide> {
    uploads
        .iter()
        .enumerate()
        .map(|(index, upload)| NewSlide {
            image_url: upload.url.clone(),
            caption: captions.get(index).cloned().unwrap_or_default(),
        })
        .collect()
}

#[derive(Debug, sqlx::FromRow)]
struct HomepageRow {
    id: i32,
    title: String,
    subtitle: String,
    version: i32,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CarouselRow {
    id: i32,
    image_url: String,
    caption: String,
    link_url: Option<String>,
    order_index: i32,
}

impl From<CarouselRow> for CarouselItem {
    fn from(row: CarouselRow) -> Self {
        Self {
            id: CarouselItemId::new(row.id),
            image_url: row.image_url,
            caption: row.caption,
            link_url: row.link_url,
            order_index: row.order_index,
        }
    }
}

/// Repository for the homepage.
pub struct HomepageRepository<'a> {
    storage: &'a Storage,
    files: &'a FileStore,
}

impl<'a> HomepageRepository<'a> {
    /// Create a new homepage repository.
    #[must_use]
    pub const fn new(storage: &'a Storage, files: &'a FileStore) -> Self {
        Self { storage, files }
    }

    /// Get the homepage with its carousel.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Option<Homepage>, RepositoryError> {
        let pool = self.storage.pool();

        let Some(root) = sqlx::query_as::<_, HomepageRow>(
            "SELECT id, title, subtitle, version, updated_at FROM catalog.homepage ORDER BY id LIMIT 1",
        )
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let carousel = fetch_carousel(pool, root.id).await?;
        Ok(Some(Homepage {
            id: PageId::new(root.id),
            title: root.title,
            subtitle: root.subtitle,
            version: root.version,
            carousel,
            updated_at: root.updated_at,
        }))
    }

    /// Create the homepage when none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the page already exists, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(uploads = uploads.len()))]
    pub async fn create(
        &self,
        input: HomepageInput,
        uploads: Vec<StoredFile>,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Homepage>, RepositoryError> {
        let slides = new_slides(&uploads, &input.captions);

        let write = self.storage.with_transaction(move |conn| {
            Box::pin(async move {
                ensure_absent(&mut *conn, TABLE).await?;

                let id: i32 = sqlx::query_scalar(
                    "INSERT INTO catalog.homepage (title, subtitle) VALUES ($1, $2) RETURNING id",
                )
                .bind(&input.title)
                .bind(&input.subtitle)
                .fetch_one(&mut *conn)
                .await?;

                insert_children(&mut *conn, &CAROUSEL.rows, id, 0, &slides).await?;
                Ok::<_, RepositoryError>(Vec::<String>::new())
            })
        });
        settle_files(self.files, &uploads, write).await?;

        tracing::info!("homepage created");
        self.saved(warnings).await
    }

    /// Replace the homepage text, delete the listed slides and append
    /// uploaded ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the page row is missing,
    /// `RepositoryError::Conflict` on a stale `expected_version`, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(
        skip_all,
        fields(deleted = input.deleted_carousel_ids.len(), uploads = uploads.len())
    )]
    pub async fn update(
        &self,
        input: HomepageInput,
        uploads: Vec<StoredFile>,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Homepage>, RepositoryError> {
        let slides = new_slides(&uploads, &input.captions);

        let write = self.storage.with_transaction(move |conn| {
            Box::pin(async move {
                let id = lock_page(&mut *conn, TABLE, input.expected_version).await?;

                sqlx::query(
                    "UPDATE catalog.homepage SET title = $2, subtitle = $3, version = version + 1 WHERE id = $1",
                )
                .bind(id)
                .bind(&input.title)
                .bind(&input.subtitle)
                .execute(&mut *conn)
                .await?;

                let deleted: Vec<i32> = input
                    .deleted_carousel_ids
                    .iter()
                    .map(|c| c.as_i32())
                    .collect();
                let edit = edit_file_collection(&mut *conn, &CAROUSEL, id, &deleted, &slides).await?;

                Ok::<_, RepositoryError>(edit.removed_urls)
            })
        });
        settle_files(self.files, &uploads, write).await?;

        tracing::info!("homepage updated");
        self.saved(warnings).await
    }

    async fn saved(&self, warnings: Vec<InputWarning>) -> Result<Saved<Homepage>, RepositoryError> {
        let homepage = self.fetch().await?.ok_or(RepositoryError::NotFound)?;
        Ok(Saved::new(homepage, warnings))
    }
}

async fn fetch_carousel<'e>(
    executor: impl PgExecutor<'e>,
    homepage_id: i32,
) -> Result<Vec<CarouselItem>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CarouselRow>(
        r"
        SELECT id, image_url, caption, link_url, order_index
        FROM catalog.homepage_carousel_item
        WHERE homepage_id = $1
        ORDER BY order_index, id
        ",
    )
    .bind(homepage_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
