//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                   - Liveness
//! GET    /health/ready                             - Readiness (database reachable)
//! GET    /uploads/*                                - Uploaded files, read-only
//!
//! # Products (multipart writes, files under `images`)
//! GET    /api/products                             - Listing (?search, page, per_page)
//! POST   /api/products                             - Create
//! GET    /api/products/{id}                        - Detail
//! PUT    /api/products/{id}                        - Update
//! DELETE /api/products/{id}                        - Delete
//! PUT    /api/products/{id}/primary-image/{image}  - Set primary image
//!
//! # Orders (JSON)
//! GET    /api/orders                               - Listing (?status, page, per_page)
//! POST   /api/orders                               - Place an order
//! GET    /api/orders/{id}                          - Detail
//! PUT    /api/orders/{id}/status                   - Change status
//! DELETE /api/orders/{id}                          - Delete
//!
//! # Reviews (multipart writes, file under `photo`)
//! GET    /api/reviews                              - Listing (?page, per_page)
//! POST   /api/reviews                              - Create
//! GET    /api/reviews/{id}                         - Detail
//! PUT    /api/reviews/{id}                         - Update
//! DELETE /api/reviews/{id}                         - Delete
//!
//! # Content pages (multipart writes)
//! GET|POST|PUT /api/pages/company                  - files under `certificates`
//! GET|POST|PUT /api/pages/homepage                 - files under `carousel_images`
//! GET|POST|PUT /api/pages/faq
//! GET|POST|PUT /api/pages/partnership              - files under `images`
//! GET|POST|PUT /api/pages/payment
//! GET|POST|PUT /api/pages/delivery
//! GET|POST|PUT /api/pages/contacts
//! ```

pub mod multipart;
pub mod orders;
pub mod pages;
pub mod products;
pub mod reviews;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::{Router, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::files::PUBLIC_PREFIX;
use crate::state::AppState;

/// Build the API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(products::router())
        .merge(orders::router())
        .merge(reviews::router())
        .merge(pages::router())
}

/// Build the complete application: health checks, API, uploaded files and
/// request tracing.
pub fn app(state: AppState) -> Router {
    let uploads = ServeDir::new(state.files().root());
    let body_limit = state.config().max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .nest_service(PUBLIC_PREFIX, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ServerConfig;
    use crate::db::Storage;
    use crate::files::FileStore;

    /// State whose pool never connects; only handlers that fail before
    /// touching the database can be exercised.
    fn offline_state(uploads: &std::path::Path) -> AppState {
        let config = ServerConfig::from_lookup(|key| {
            (key == "DATABASE_URL").then(|| "postgres://showcase@localhost:1/showcase".to_string())
        })
        .unwrap();
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(100))
            .connect_lazy("postgres://showcase@localhost:1/showcase")
            .unwrap();
        AppState::new(
            config,
            Storage::new(pool),
            FileStore::new(uploads, PUBLIC_PREFIX),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(offline_state(dir.path()))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_order_without_items_is_rejected_before_storage() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"customer_name": "Dana", "phone": "+7 700", "total_amount": "0", "items": []}"#;

        let response = app(offline_state(dir.path()))
            .oneshot(
                Request::post("/api/orders")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_product_form_without_title_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"price\"\r\n\r\n10\r\n--{boundary}--\r\n"
        );

        let response = app(offline_state(dir.path()))
            .oneshot(
                Request::post("/api/products")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_serves_uploaded_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("products")).unwrap();
        std::fs::write(dir.path().join("products/ring.txt"), "ring").unwrap();

        let response = app(offline_state(dir.path()))
            .oneshot(
                Request::get("/uploads/products/ring.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
