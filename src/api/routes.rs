use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{lifecycle, listing};
use crate::state::AppState;

/// Build the `/api/v1` router. Shared by the server binary and the
/// integration tests so both exercise identical routing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/documents", get(listing::documents_handler))
        .route("/api/v1/drafts", get(listing::drafts_handler).post(lifecycle::create_draft_handler))
        .route("/api/v1/me/documents", get(listing::my_documents_handler))
        .route("/api/v1/dashboard", get(listing::dashboard_handler))
        .route("/api/v1/facets", get(listing::facets_handler))
        .route(
            "/api/v1/documents/{doc_id}",
            get(lifecycle::get_document_handler).patch(lifecycle::patch_document_handler),
        )
        .route(
            "/api/v1/documents/{doc_id}/archive",
            post(lifecycle::archive_handler),
        )
        .route("/api/v1/reviews/{doc_id}", post(lifecycle::publish_handler))
        .route(
            "/api/v1/approvals/{doc_id}",
            post(lifecycle::approve_handler).delete(lifecycle::request_changes_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
