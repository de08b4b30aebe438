//! Content page route handlers.
//!
//! Every page is a singleton: `GET` reads it, `POST` creates it when missing
//! (409 otherwise) and `PUT` replaces it. Writes are multipart forms; list
//! fields arrive as stringified JSON.

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::get,
};
use tracing::instrument;

use super::multipart::{SubmittedForm, store_all};
use crate::db::{
    CompanyRepository, ContactsRepository, DeliveryRepository, FaqRepository,
    HomepageRepository, PartnershipRepository, PaymentRepository,
};
use crate::error::AppError;
use crate::files::UploadKind;
use crate::input::Warnings;
use crate::models::{
    Company, CompanyInput, Contacts, ContactsInput, Delivery, DeliveryInput, Faq, FaqInput,
    Homepage, HomepageInput, Partnership, PartnershipInput, Payment, PaymentInput, Saved,
};
use crate::state::AppState;

const CERTIFICATES_FIELD: &str = "certificates";
const CAROUSEL_FIELD: &str = "carousel_images";
const IMAGES_FIELD: &str = "images";

type Created<T> = (StatusCode, Json<Saved<T>>);

/// Build the pages router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/pages/company",
            get(company_show).post(company_create).put(company_update),
        )
        .route(
            "/api/pages/homepage",
            get(homepage_show).post(homepage_create).put(homepage_update),
        )
        .route(
            "/api/pages/faq",
            get(faq_show).post(faq_create).put(faq_update),
        )
        .route(
            "/api/pages/partnership",
            get(partnership_show)
                .post(partnership_create)
                .put(partnership_update),
        )
        .route(
            "/api/pages/payment",
            get(payment_show).post(payment_create).put(payment_update),
        )
        .route(
            "/api/pages/delivery",
            get(delivery_show).post(delivery_create).put(delivery_update),
        )
        .route(
            "/api/pages/contacts",
            get(contacts_show).post(contacts_create).put(contacts_update),
        )
}

fn missing(page: &str) -> AppError {
    AppError::NotFound(format!("{page} page"))
}

// =============================================================================
// Company
// =============================================================================

#[instrument(skip(state))]
pub async fn company_show(State(state): State<AppState>) -> Result<Json<Company>, AppError> {
    CompanyRepository::new(state.storage(), state.files())
        .fetch()
        .await?
        .map(Json)
        .ok_or_else(|| missing("company"))
}

#[instrument(skip_all)]
pub async fn company_create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Created<Company>, AppError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = CompanyInput::from_form(&form.fields, &mut warnings)?;
    let uploads = store_all(
        state.files(),
        UploadKind::Certificate,
        form.take_files(CERTIFICATES_FIELD),
    )
    .await?;

    let repo = CompanyRepository::new(state.storage(), state.files());
    let saved = repo.create(input, uploads, warnings.into_vec()).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip_all)]
pub async fn company_update(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Saved<Company>>, AppError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = CompanyInput::from_form(&form.fields, &mut warnings)?;
    let uploads = store_all(
        state.files(),
        UploadKind::Certificate,
        form.take_files(CERTIFICATES_FIELD),
    )
    .await?;

    let repo = CompanyRepository::new(state.storage(), state.files());
    Ok(Json(repo.update(input, uploads, warnings.into_vec()).await?))
}

// =============================================================================
// Homepage
// =============================================================================

#[instrument(skip(state))]
pub async fn homepage_show(State(state): State<AppState>) -> Result<Json<Homepage>, AppError> {
    HomepageRepository::new(state.storage(), state.files())
        .fetch()
        .await?
        .map(Json)
        .ok_or_else(|| missing("homepage"))
}

#[instrument(skip_all)]
pub async fn homepage_create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Created<Homepage>, AppError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = HomepageInput::from_form(&form.fields, &mut warnings)?;
    let uploads = store_all(
        state.files(),
        UploadKind::Carousel,
        form.take_files(CAROUSEL_FIELD),
    )
    .await?;

    let repo = HomepageRepository::new(state.storage(), state.files());
    let saved = repo.create(input, uploads, warnings.into_vec()).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip_all)]
pub async fn homepage_update(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Saved<Homepage>>, AppError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = HomepageInput::from_form(&form.fields, &mut warnings)?;
    let uploads = store_all(
        state.files(),
        UploadKind::Carousel,
        form.take_files(CAROUSEL_FIELD),
    )
    .await?;

    let repo = HomepageRepository::new(state.storage(), state.files());
    Ok(Json(repo.update(input, uploads, warnings.into_vec()).await?))
}

// =============================================================================
// FAQ
// =============================================================================

#[instrument(skip(state))]
pub async fn faq_show(State(state): State<AppState>) -> Result<Json<Faq>, AppError> {
    FaqRepository::new(state.storage())
        .fetch()
        .await?
        .map(Json)
        .ok_or_else(|| missing("faq"))
}

#[instrument(skip_all)]
pub async fn faq_create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Created<Faq>, AppError> {
    let form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = FaqInput::from_form(&form.fields, &mut warnings)?;

    let saved = FaqRepository::new(state.storage())
        .create(input, warnings.into_vec())
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip_all)]
pub async fn faq_update(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Saved<Faq>>, AppError> {
    let form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = FaqInput::from_form(&form.fields, &mut warnings)?;

    Ok(Json(
        FaqRepository::new(state.storage())
            .update(input, warnings.into_vec())
            .await?,
    ))
}

// =============================================================================
// Partnership
// =============================================================================

#[instrument(skip(state))]
pub async fn partnership_show(
    State(state): State<AppState>,
) -> Result<Json<Partnership>, AppError> {
    PartnershipRepository::new(state.storage(), state.files())
        .fetch()
        .await?
        .map(Json)
        .ok_or_else(|| missing("partnership"))
}

#[instrument(skip_all)]
pub async fn partnership_create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Created<Partnership>, AppError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = PartnershipInput::from_form(&form.fields, &mut warnings)?;
    let uploads = store_all(
        state.files(),
        UploadKind::Partnership,
        form.take_files(IMAGES_FIELD),
    )
    .await?;

    let repo = PartnershipRepository::new(state.storage(), state.files());
    let saved = repo.create(input, uploads, warnings.into_vec()).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip_all)]
pub async fn partnership_update(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Saved<Partnership>>, AppError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = PartnershipInput::from_form(&form.fields, &mut warnings)?;
    let uploads = store_all(
        state.files(),
        UploadKind::Partnership,
        form.take_files(IMAGES_FIELD),
    )
    .await?;

    let repo = PartnershipRepository::new(state.storage(), state.files());
    Ok(Json(repo.update(input, uploads, warnings.into_vec()).await?))
}

// =============================================================================
// Payment
// =============================================================================

#[instrument(skip(state))]
pub async fn payment_show(State(state): State<AppState>) -> Result<Json<Payment>, AppError> {
    PaymentRepository::new(state.storage())
        .fetch()
        .await?
        .map(Json)
        .ok_or_else(|| missing("payment"))
}

#[instrument(skip_all)]
pub async fn payment_create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Created<Payment>, AppError> {
    let form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = PaymentInput::from_form(&form.fields, &mut warnings)?;

    let saved = PaymentRepository::new(state.storage())
        .create(input, warnings.into_vec())
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip_all)]
pub async fn payment_update(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Saved<Payment>>, AppError> {
    let form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = PaymentInput::from_form(&form.fields, &mut warnings)?;

    Ok(Json(
        PaymentRepository::new(state.storage())
            .update(input, warnings.into_vec())
            .await?,
    ))
}

// =============================================================================
// Delivery
// =============================================================================

#[instrument(skip(state))]
pub async fn delivery_show(State(state): State<AppState>) -> Result<Json<Delivery>, AppError> {
    DeliveryRepository::new(state.storage())
        .fetch()
        .await?
        .map(Json)
        .ok_or_else(|| missing("delivery"))
}

#[instrument(skip_all)]
pub async fn delivery_create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Created<Delivery>, AppError> {
    let form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = DeliveryInput::from_form(&form.fields, &mut warnings)?;

    let saved = DeliveryRepository::new(state.storage())
        .create(input, warnings.into_vec())
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip_all)]
pub async fn delivery_update(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Saved<Delivery>>, AppError> {
    let form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = DeliveryInput::from_form(&form.fields, &mut warnings)?;

    Ok(Json(
        DeliveryRepository::new(state.storage())
            .update(input, warnings.into_vec())
            .await?,
    ))
}

// =============================================================================
// Contacts
// =============================================================================

#[instrument(skip(state))]
pub async fn contacts_show(State(state): State<AppState>) -> Result<Json<Contacts>, AppError> {
    ContactsRepository::new(state.storage())
        .fetch()
        .await?
        .map(Json)
        .ok_or_else(|| missing("contacts"))
}

#[instrument(skip_all)]
pub async fn contacts_create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Created<Contacts>, AppError> {
    let form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = ContactsInput::from_form(&form.fields, &mut warnings)?;

    let saved = ContactsRepository::new(state.storage())
        .create(input, warnings.into_vec())
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip_all)]
pub async fn contacts_update(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Saved<Contacts>>, AppError> {
    let form = SubmittedForm::read(multipart).await?;
    let mut warnings = Warnings::new();
    let input = ContactsInput::from_form(&form.fields, &mut warnings)?;

    Ok(Json(
        ContactsRepository::new(state.storage())
            .update(input, warnings.into_vec())
            .await?,
    ))
}
