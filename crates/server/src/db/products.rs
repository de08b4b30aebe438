//! Database operations for the product aggregate.
//!
//! A product owns two ordered collections:
//!
//! - description blocks, replaced wholesale on every update;
//! - images, each backed by a file. Images are removed by id and new uploads
//!   are appended. Exactly one image is primary whenever the product has any.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;
use sqlx::{PgConnection, PgExecutor};

use showcase_core::{BlockId, ProductId, ProductImageId, ValidationError};

use super::children::{
    self, ChildRow, ChildTable, FileTable, edit_file_collection, file_urls, insert_children,
    replace_children,
};
use super::{RepositoryError, Storage, check_version};
use crate::files::{FileStore, StoredFile};
use crate::input::InputWarning;
use crate::models::common::{ContentBlock, Page, Saved};
use crate::models::product::{
    PrimaryImage, Product, ProductFilter, ProductImage, ProductInput, promotion_candidate,
};
use crate::projection::{ChildSet, fold_fan_out};

const BLOCKS: ChildTable = ChildTable {
    table: "catalog.product_description_block",
    parent_column: "product_id",
    columns: "title, content",
};

const IMAGES: FileTable = FileTable {
    rows: ChildTable {
        table: "catalog.product_image",
        parent_column: "product_id",
        columns: "image_url, is_primary",
    },
    url_column: "image_url",
};

const SINGLE_PRIMARY_INDEX: &str = "idx_product_image_single_primary";

/// A freshly uploaded image, inserted as non-primary.
struct NewImage(String);

impl ChildRow for NewImage {
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.0.clone());
        row.push_bind(false);
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    title: String,
    description: String,
    price: Decimal,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, images: Vec<ProductImage>, blocks: Vec<ContentBlock>) -> Product {
        Product {
            id: ProductId::new(self.id),
            title: self.title,
            description: self.description,
            price: self.price,
            version: self.version,
            images,
            blocks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: i32,
    image_url: String,
    is_primary: bool,
    order_index: i32,
}

impl From<ImageRow> for ProductImage {
    fn from(row: ImageRow) -> Self {
        Self {
            id: ProductImageId::new(row.id),
            image_url: row.image_url,
            is_primary: row.is_primary,
            order_index: row.order_index,
        }
    }
}

/// One row of the listing query: a product joined to one image and one block.
#[derive(Debug, sqlx::FromRow)]
struct ProductJoinRow {
    id: i32,
    title: String,
    description: String,
    price: Decimal,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    image_id: Option<i32>,
    image_url: Option<String>,
    image_is_primary: Option<bool>,
    image_order_index: Option<i32>,
    block_id: Option<i32>,
    block_title: Option<String>,
    block_content: Option<String>,
    block_order_index: Option<i32>,
}

impl ProductJoinRow {
    fn root(&self) -> ProductRow {
        ProductRow {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn image(&self) -> Option<ProductImage> {
        Some(ProductImage {
            id: ProductImageId::new(self.image_id?),
            image_url: self.image_url.clone()?,
            is_primary: self.image_is_primary.unwrap_or(false),
            order_index: self.image_order_index?,
        })
    }

    fn block(&self) -> Option<ContentBlock> {
        Some(ContentBlock {
            id: BlockId::new(self.block_id?),
            title: self.block_title.clone().unwrap_or_default(),
            content: self.block_content.clone().unwrap_or_default(),
            order_index: self.block_order_index?,
        })
    }
}

struct FoldedProduct {
    root: ProductRow,
    images: ChildSet<ProductImage>,
    blocks: ChildSet<ContentBlock>,
}

const LIST_SQL: &str = r"
    WITH page AS (
        SELECT id, title, description, price, version, created_at, updated_at
        FROM catalog.product
        WHERE $1::TEXT IS NULL OR title ILIKE $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
    )
    SELECT
        p.id, p.title, p.description, p.price, p.version, p.created_at, p.updated_at,
        i.id AS image_id, i.image_url, i.is_primary AS image_is_primary,
        i.order_index AS image_order_index,
        b.id AS block_id, b.title AS block_title, b.content AS block_content,
        b.order_index AS block_order_index
    FROM page p
    LEFT JOIN catalog.product_image i ON i.product_id = p.id
    LEFT JOIN catalog.product_description_block b ON b.product_id = p.id
    ORDER BY p.created_at DESC, p.id DESC
";

// =============================================================================
// Repository
// =============================================================================

/// Repository for product aggregates.
pub struct ProductRepository<'a> {
    storage: &'a Storage,
    files: &'a FileStore,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(storage: &'a Storage, files: &'a FileStore) -> Self {
        Self { storage, files }
    }

    /// Get a product with its images and blocks.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let pool = self.storage.pool();

        let Some(root) = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, title, description, price, version, created_at, updated_at
            FROM catalog.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let images = fetch_images(pool, id).await?;
        let blocks = children::fetch_blocks(pool, &BLOCKS, id.as_i32()).await?;

        Ok(Some(root.into_product(images, blocks)))
    }

    /// List products newest first, optionally filtered by title.
    ///
    /// The page is fetched with one query joining both collections, then
    /// folded back into one product per root.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, filter: &ProductFilter) -> Result<Page<Product>, RepositoryError> {
        let pool = self.storage.pool();
        let pattern = filter.search_pattern();
        let pagination = filter.pagination();

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM catalog.product WHERE $1::TEXT IS NULL OR title ILIKE $1",
        )
        .bind(pattern.as_deref())
        .fetch_one(pool)
        .await?;

        let rows = sqlx::query_as::<_, ProductJoinRow>(LIST_SQL)
            .bind(pattern.as_deref())
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(pool)
            .await?;

        let products = fold_fan_out(
            rows,
            |row| row.id,
            |row| FoldedProduct {
                root: row.root(),
                images: ChildSet::new(),
                blocks: ChildSet::new(),
            },
            |folded, row| {
                folded.images.insert_opt(row.image());
                folded.blocks.insert_opt(row.block());
            },
        )
        .into_iter()
        .map(|f| {
            f.root
                .into_product(f.images.into_sorted(), f.blocks.into_sorted())
        })
        .collect();

        Ok(Page::new(products, total, pagination))
    }

    /// Create a product with its blocks and uploaded images.
    ///
    /// Uploads are appended in the order given. Unless the input picks one,
    /// the first upload becomes the primary image. On failure the uploads
    /// are removed from disk.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if the primary choice does not
    /// match the uploads, or `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(title = %input.title, uploads = uploads.len()))]
    pub async fn create(
        &self,
        input: ProductInput,
        uploads: Vec<StoredFile>,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Product>, RepositoryError> {
        let result = self.create_inner(input, &uploads).await;
        let id = match result {
            Ok(id) => id,
            Err(e) => {
                self.files.discard(&uploads).await;
                return Err(e);
            }
        };

        tracing::info!(product_id = %id, "product created");
        let product = self.fetch(id).await?.ok_or(RepositoryError::NotFound)?;
        Ok(Saved::new(product, warnings))
    }

    async fn create_inner(
        &self,
        input: ProductInput,
        uploads: &[StoredFile],
    ) -> Result<ProductId, RepositoryError> {
        if matches!(input.primary, Some(PrimaryImage::Existing(_))) {
            return Err(ValidationError::invalid(
                "primary_image_id",
                "a new product has no existing images",
            )
            .into());
        }
        validate_upload_choice(input.primary, uploads.len())?;
        let new_images = new_images(uploads);

        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let id: i32 = sqlx::query_scalar(
                        r"
                        INSERT INTO catalog.product (title, description, price)
                        VALUES ($1, $2, $3)
                        RETURNING id
                        ",
                    )
                    .bind(&input.title)
                    .bind(&input.description)
                    .bind(input.price)
                    .fetch_one(&mut *conn)
                    .await?;

                    insert_children(&mut *conn, &BLOCKS, id, 0, &input.blocks).await?;
                    let new_ids =
                        insert_children(&mut *conn, &IMAGES.rows, id, 0, &new_images).await?;
                    apply_primary(&mut *conn, ProductId::new(id), input.primary, &new_ids).await?;

                    Ok::<_, RepositoryError>(ProductId::new(id))
                })
            })
            .await
    }

    /// Replace a product's scalars and blocks, delete the listed images and
    /// append uploads.
    ///
    /// Files of deleted images are removed after the transaction commits. On
    /// failure the uploads are removed from disk and nothing is changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist,
    /// `RepositoryError::Conflict` on a stale `expected_version`,
    /// `RepositoryError::Validation` for a primary choice that matches no
    /// image, or `RepositoryError::Database` if a write fails.
    #[tracing::instrument(
        skip_all,
        fields(product_id = %id, deleted = input.deleted_image_ids.len(), uploads = uploads.len())
    )]
    pub async fn update(
        &self,
        id: ProductId,
        input: ProductInput,
        uploads: Vec<StoredFile>,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Product>, RepositoryError> {
        let removed_urls = match self.update_inner(id, input, &uploads).await {
            Ok(urls) => urls,
            Err(e) => {
                self.files.discard(&uploads).await;
                return Err(e);
            }
        };

        tracing::info!(product_id = %id, removed_images = removed_urls.len(), "product updated");
        self.files.cleanup(&removed_urls).await;

        let product = self.fetch(id).await?.ok_or(RepositoryError::NotFound)?;
        Ok(Saved::new(product, warnings))
    }

    async fn update_inner(
        &self,
        id: ProductId,
        input: ProductInput,
        uploads: &[StoredFile],
    ) -> Result<Vec<String>, RepositoryError> {
        validate_upload_choice(input.primary, uploads.len())?;
        let new_images = new_images(uploads);

        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let version: i32 = sqlx::query_scalar(
                        "SELECT version FROM catalog.product WHERE id = $1 FOR UPDATE",
                    )
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                    check_version(input.expected_version, version)?;

                    sqlx::query(
                        r"
                        UPDATE catalog.product
                        SET title = $2, description = $3, price = $4, version = version + 1
                        WHERE id = $1
                        ",
                    )
                    .bind(id)
                    .bind(&input.title)
                    .bind(&input.description)
                    .bind(input.price)
                    .execute(&mut *conn)
                    .await?;

                    let parent = id.as_i32();
                    replace_children(&mut *conn, &BLOCKS, parent, &input.blocks).await?;

                    let deleted: Vec<i32> =
                        input.deleted_image_ids.iter().map(|i| i.as_i32()).collect();
                    let edit =
                        edit_file_collection(&mut *conn, &IMAGES, parent, &deleted, &new_images)
                            .await?;
                    apply_primary(&mut *conn, id, input.primary, &edit.inserted_ids).await?;

                    Ok::<_, RepositoryError>(edit.removed_urls)
                })
            })
            .await
    }

    /// Make `image_id` the product's only primary image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist or the
    /// image belongs to another product.
    #[tracing::instrument(skip(self))]
    pub async fn set_primary(
        &self,
        product_id: ProductId,
        image_id: ProductImageId,
    ) -> Result<Product, RepositoryError> {
        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    lock_product(&mut *conn, product_id).await?;
                    set_primary_in(&mut *conn, product_id, image_id).await
                })
            })
            .await?;

        tracing::info!(%product_id, %image_id, "primary image changed");
        self.fetch(product_id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product; blocks and images cascade, image files are removed
    /// after commit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product was deleted.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let urls = self
            .storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    // Concurrent updates wait here, so `urls` covers every cascaded image.
                    lock_product(&mut *conn, id).await?;
                    let urls = file_urls(&mut *conn, &IMAGES, id.as_i32()).await?;

                    sqlx::query("DELETE FROM catalog.product WHERE id = $1")
                        .bind(id)
                        .execute(&mut *conn)
                        .await?;

                    Ok::<_, RepositoryError>(urls)
                })
            })
            .await?;

        tracing::info!(product_id = %id, files = urls.len(), "product deleted");
        self.files.cleanup(&urls).await;
        Ok(())
    }
}

// =============================================================================
// Helpers (inside a unit of work)
// =============================================================================

fn new_images(uploads: &[StoredFile]) -> Vec<NewImage> {
    uploads.iter().map(|u| NewImage(u.url.clone())).collect()
}

fn validate_upload_choice(
    primary: Option<PrimaryImage>,
    upload_count: usize,
) -> Result<(), ValidationError> {
    match primary {
        Some(PrimaryImage::Upload(index)) if index >= upload_count => Err(ValidationError::invalid(
            "primary_upload_index",
            format!("upload {index} does not exist ({upload_count} uploaded)"),
        )),
        _ => Ok(()),
    }
}

async fn fetch_images<'e>(
    executor: impl PgExecutor<'e>,
    product_id: ProductId,
) -> Result<Vec<ProductImage>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ImageRow>(
        r"
        SELECT id, image_url, is_primary, order_index
        FROM catalog.product_image
        WHERE product_id = $1
        ORDER BY order_index, id
        ",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

async fn lock_product(conn: &mut PgConnection, id: ProductId) -> Result<(), RepositoryError> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM catalog.product WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or(RepositoryError::NotFound)
}

/// Clear the siblings' flags, then set the target's.
async fn set_primary_in(
    conn: &mut PgConnection,
    product_id: ProductId,
    image_id: ProductImageId,
) -> Result<(), RepositoryError> {
    let belongs: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM catalog.product_image WHERE id = $1 AND product_id = $2)",
    )
    .bind(image_id)
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await?;
    if !belongs {
        return Err(RepositoryError::NotFound);
    }

    sqlx::query(
        r"
        UPDATE catalog.product_image
        SET is_primary = FALSE
        WHERE product_id = $1 AND is_primary AND id <> $2
        ",
    )
    .bind(product_id)
    .bind(image_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE catalog.product_image SET is_primary = TRUE WHERE id = $1")
        .bind(image_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(SINGLE_PRIMARY_INDEX)
            {
                return RepositoryError::Conflict(
                    "another primary image was set concurrently".to_string(),
                );
            }
            RepositoryError::Database(e)
        })?;

    Ok(())
}

/// Apply an explicit primary choice, or promote an image if none is primary.
async fn apply_primary(
    conn: &mut PgConnection,
    product_id: ProductId,
    choice: Option<PrimaryImage>,
    new_ids: &[i32],
) -> Result<(), RepositoryError> {
    let target = match choice {
        Some(PrimaryImage::Existing(image_id)) => Some(image_id),
        Some(PrimaryImage::Upload(index)) => {
            let id = new_ids.get(index).copied().ok_or_else(|| {
                ValidationError::invalid(
                    "primary_upload_index",
                    format!("upload {index} does not exist"),
                )
            })?;
            Some(ProductImageId::new(id))
        }
        None => None,
    };

    if let Some(image_id) = target {
        return set_primary_in(conn, product_id, image_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ValidationError::invalid(
                    "primary_image_id",
                    format!("image {image_id} does not belong to this product"),
                )
                .into(),
                other => other,
            });
    }

    promote_if_missing(conn, product_id).await
}

async fn promote_if_missing(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<(), RepositoryError> {
    let images: Vec<(ProductImageId, i32, bool)> = sqlx::query_as(
        "SELECT id, order_index, is_primary FROM catalog.product_image WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    if images.iter().any(|(_, _, is_primary)| *is_primary) {
        return Ok(());
    }

    let candidates: Vec<(ProductImageId, i32)> =
        images.iter().map(|(id, order_index, _)| (*id, *order_index)).collect();
    let Some(image_id) = promotion_candidate(&candidates) else {
        return Ok(());
    };

    tracing::debug!(%product_id, %image_id, "promoting image to primary");
    sqlx::query("UPDATE catalog.product_image SET is_primary = TRUE WHERE id = $1")
        .bind(image_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_upload_choice() {
        assert!(validate_upload_choice(None, 0).is_ok());
        assert!(validate_upload_choice(Some(PrimaryImage::Upload(1)), 2).is_ok());
        assert!(validate_upload_choice(Some(PrimaryImage::Upload(2)), 2).is_err());
        assert!(
            validate_upload_choice(Some(PrimaryImage::Existing(ProductImageId::new(9))), 0).is_ok()
        );
    }

    #[test]
    fn test_join_row_without_children() {
        let row = ProductJoinRow {
            id: 1,
            title: "Ring".into(),
            description: String::new(),
            price: Decimal::ZERO,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            image_id: None,
            image_url: None,
            image_is_primary: None,
            image_order_index: None,
            block_id: None,
            block_title: None,
            block_content: None,
            block_order_index: None,
        };
        assert!(row.image().is_none());
        assert!(row.block().is_none());
        assert_eq!(row.root().id, 1);
    }

    #[test]
    fn test_list_sql_paginates_roots_before_joining() {
        let page_cte = LIST_SQL.find("LIMIT $2 OFFSET $3");
        let first_join = LIST_SQL.find("LEFT JOIN");
        assert!(page_cte < first_join);
    }

    #[test]
    fn test_new_images_preserve_upload_order() {
        let uploads = vec![
            StoredFile {
                url: "/uploads/products/a.png".into(),
                original_name: "a.png".into(),
                content_type: None,
            },
            StoredFile {
                url: "/uploads/products/b.png".into(),
                original_name: "b.png".into(),
                content_type: None,
            },
        ];
        let images = new_images(&uploads);
        assert_eq!(images.len(), 2);
        assert_eq!(images.first().map(|i| i.0.as_str()), Some("/uploads/products/a.png"));
    }
}
