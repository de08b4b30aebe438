//! Review route handlers.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use showcase_core::ReviewId;

use super::multipart::{SubmittedForm, store_all};
use crate::db::ReviewRepository;
use crate::error::AppError;
use crate::files::{StoredFile, UploadKind};
use crate::models::{Pagination, Review, ReviewInput};
use crate::state::AppState;

/// Multipart field carrying the review photo.
const PHOTO_FIELD: &str = "photo";

/// Query parameters for the review listing.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Build the reviews router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reviews", get(list).post(create))
        .route(
            "/api/reviews/{id}",
            get(show).put(update).delete(delete),
        )
}

/// List reviews, newest first.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Vec<Review>>, AppError> {
    let pagination = Pagination::from_query(query.page, query.per_page);
    let repo = ReviewRepository::new(state.storage(), state.files());
    Ok(Json(
        repo.list(pagination.limit(), pagination.offset()).await?,
    ))
}

/// Get one review.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Result<Json<Review>, AppError> {
    let repo = ReviewRepository::new(state.storage(), state.files());
    repo.fetch(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("review {id}")))
}

/// Create a review, with an optional photo.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let input = ReviewInput::from_form(&form.fields)?;
    let photo = store_photo(&state, &mut form).await?;

    let repo = ReviewRepository::new(state.storage(), state.files());
    Ok((StatusCode::CREATED, Json(repo.create(input, photo).await?)))
}

/// Update a review; a new photo replaces the current one.
#[instrument(skip(state, multipart))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
    multipart: Multipart,
) -> Result<Json<Review>, AppError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let input = ReviewInput::from_form(&form.fields)?;
    let photo = store_photo(&state, &mut form).await?;

    let repo = ReviewRepository::new(state.storage(), state.files());
    Ok(Json(repo.update(id, input, photo).await?))
}

/// Delete a review and its photo.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode, AppError> {
    ReviewRepository::new(state.storage(), state.files())
        .delete(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Store the first submitted photo; extra files under the field are ignored.
async fn store_photo(
    state: &AppState,
    form: &mut SubmittedForm,
) -> Result<Option<StoredFile>, AppError> {
    let mut photos = form.take_files(PHOTO_FIELD);
    if photos.len() > 1 {
        tracing::warn!(count = photos.len(), "ignoring extra review photos");
        photos.truncate(1);
    }
    Ok(store_all(state.files(), UploadKind::Review, photos)
        .await?
        .into_iter()
        .next())
}
