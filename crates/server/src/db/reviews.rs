//! Database operations for reviews.
//!
//! A review owns at most one photo. Replacing or removing it deletes the old
//! file once the row change has committed.

use chrono::{DateTime, Utc};

use showcase_core::ReviewId;

use super::{RepositoryError, Storage};
use crate::files::{FileStore, StoredFile};
use crate::models::review::{Review, ReviewInput};

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    author_name: String,
    content: String,
    rating: i16,
    photo_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            author_name: row.author_name,
            content: row.content,
            rating: row.rating,
            photo_url: row.photo_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const REVIEW_COLUMNS: &str =
    "id, author_name, content, rating, photo_url, created_at, updated_at";

/// Which photo a review should end up with after an update.
#[derive(Debug, PartialEq, Eq)]
enum PhotoChange<'a> {
    Keep,
    Replace(&'a str),
    Remove,
}

impl<'a> PhotoChange<'a> {
    fn decide(upload_url: Option<&'a str>, remove_requested: bool) -> Self {
        match upload_url {
            Some(url) => Self::Replace(url),
            None if remove_requested => Self::Remove,
            None => Self::Keep,
        }
    }
}

/// Repository for reviews.
pub struct ReviewRepository<'a> {
    storage: &'a Storage,
    files: &'a FileStore,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(storage: &'a Storage, files: &'a FileStore) -> Self {
        Self { storage, files }
    }

    /// List reviews newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM catalog.review \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.storage.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a review by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM catalog.review WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.storage.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a review, with an optional photo already saved to disk.
    ///
    /// The photo is removed from disk if the insert fails.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[tracing::instrument(skip_all, fields(rating = input.rating, photo = photo.is_some()))]
    pub async fn create(
        &self,
        input: ReviewInput,
        photo: Option<StoredFile>,
    ) -> Result<Review, RepositoryError> {
        let result = sqlx::query_as::<_, ReviewRow>(&format!(
            "INSERT INTO catalog.review (author_name, content, rating, photo_url) \
             VALUES ($1, $2, $3, $4) RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(&input.author_name)
        .bind(&input.content)
        .bind(input.rating)
        .bind(photo.as_ref().map(|p| p.url.as_str()))
        .fetch_one(self.storage.pool())
        .await;

        match result {
            Ok(row) => {
                tracing::info!(review_id = row.id, "review created");
                Ok(row.into())
            }
            Err(e) => {
                self.files.discard(photo.as_slice()).await;
                Err(e.into())
            }
        }
    }

    /// Update a review's text and rating, and optionally its photo.
    ///
    /// A new photo replaces the current one; without a new photo,
    /// `remove_photo` clears it. The replaced file is deleted after commit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(review_id = %id, photo = photo.is_some()))]
    pub async fn update(
        &self,
        id: ReviewId,
        input: ReviewInput,
        photo: Option<StoredFile>,
    ) -> Result<Review, RepositoryError> {
        let new_url = photo.as_ref().map(|p| p.url.clone());
        let remove_requested = input.remove_photo;

        let result = self
            .storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let current: Option<String> = sqlx::query_scalar::<_, Option<String>>(
                        "SELECT photo_url FROM catalog.review WHERE id = $1 FOR UPDATE",
                    )
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;

                    let (next_url, replaced) =
                        match PhotoChange::decide(new_url.as_deref(), remove_requested) {
                            PhotoChange::Keep => (current, None),
                            PhotoChange::Replace(url) => (Some(url.to_string()), current),
                            PhotoChange::Remove => (None, current),
                        };

                    let row = sqlx::query_as::<_, ReviewRow>(&format!(
                        "UPDATE catalog.review \
                         SET author_name = $2, content = $3, rating = $4, photo_url = $5 \
                         WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
                    ))
                    .bind(id)
                    .bind(&input.author_name)
                    .bind(&input.content)
                    .bind(input.rating)
                    .bind(next_url.as_deref())
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok::<_, RepositoryError>((row, replaced))
                })
            })
            .await;

        let (row, replaced) = match result {
            Ok(updated) => updated,
            Err(e) => {
                self.files.discard(photo.as_slice()).await;
                return Err(e);
            }
        };

        tracing::info!(review_id = %id, photo_replaced = replaced.is_some(), "review updated");
        self.files.cleanup(replaced.as_slice()).await;
        Ok(row.into())
    }

    /// Delete a review and its photo.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no review was deleted.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let photo_url: Option<String> = sqlx::query_scalar::<_, Option<String>>(
            "DELETE FROM catalog.review WHERE id = $1 RETURNING photo_url",
        )
        .bind(id)
        .fetch_optional(self.storage.pool())
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tracing::info!(review_id = %id, "review deleted");
        self.files.cleanup(photo_url.as_slice()).await;
        Ok(())
    }
}
