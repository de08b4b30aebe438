//! Product route handlers.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use tracing::instrument;

use showcase_core::{ProductId, ProductImageId};

use super::multipart::{SubmittedForm, store_all};
use crate::db::ProductRepository;
use crate::error::AppError;
use crate::files::UploadKind;
use crate::input::Warnings;
use crate::models::{Page, Product, ProductFilter, ProductInput, Saved};
use crate::state::AppState;

/// Multipart field carrying product image files.
const IMAGES_FIELD: &str = "images";

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list).post(create))
        .route(
            "/api/products/{id}",
            get(show).put(update).delete(delete),
        )
        .route(
            "/api/products/{id}/primary-image/{image_id}",
            put(set_primary),
        )
}

/// List products, newest first.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Page<Product>>, AppError> {
    let repo = ProductRepository::new(state.storage(), state.files());
    Ok(Json(repo.list(&filter).await?))
}

/// Get one product with its images and blocks.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    let repo = ProductRepository::new(state.storage(), state.files());
    repo.fetch(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Create a product from a multipart form.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Saved<Product>>), AppError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = ProductInput::from_form(&form.fields, &mut warnings)?;

    let uploads = store_all(state.files(), UploadKind::Product, form.take_files(IMAGES_FIELD)).await?;

    let repo = ProductRepository::new(state.storage(), state.files());
    let saved = repo.create(input, uploads, warnings.into_vec()).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// Update a product from a multipart form.
#[instrument(skip(state, multipart))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Json<Saved<Product>>, AppError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = ProductInput::from_form(&form.fields, &mut warnings)?;

    let uploads = store_all(state.files(), UploadKind::Product, form.take_files(IMAGES_FIELD)).await?;

    let repo = ProductRepository::new(state.storage(), state.files());
    Ok(Json(repo.update(id, input, uploads, warnings.into_vec()).await?))
}

/// Make one image the product's primary image.
#[instrument(skip(state))]
pub async fn set_primary(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(ProductId, ProductImageId)>,
) -> Result<Json<Product>, AppError> {
    let repo = ProductRepository::new(state.storage(), state.files());
    Ok(Json(repo.set_primary(id, image_id).await?))
}

/// Delete a product and its image files.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    let repo = ProductRepository::new(state.storage(), state.files());
    repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
