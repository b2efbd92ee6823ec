use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::identity::Actor;
use crate::error::AppError;
use crate::listing::supersession::Outcome;
use crate::models::search::{SearchParams, SortBy};
use crate::search::facets::FACET_NAMES;
use crate::state::AppState;

/// Parse listing query parameters.
///
/// The UI sends repeated facet keys (`docType[]=RFC&docType[]=PRD`, with or
/// without the brackets), a 1-based `page`, `sortBy` and a keyword `q`.
/// Pages are 0-based internally. Unknown keys are ignored.
pub fn parse_search_params(raw_query: Option<&str>) -> Result<SearchParams, AppError> {
    let mut params = SearchParams::default();

    let Some(raw) = raw_query else {
        return Ok(params);
    };

    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let key = key.trim_end_matches("[]");
        match key {
            "q" => params.query = value.into_owned(),
            "page" => {
                let page: usize = value
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("invalid page '{value}'")))?;
                if page < 1 {
                    return Err(AppError::BadRequest("page is 1-based".into()));
                }
                params.page = page - 1;
            }
            "sortBy" => {
                params.sort_by = match value.as_ref() {
                    "dateAsc" => SortBy::DateAsc,
                    "dateDesc" => SortBy::DateDesc,
                    other => {
                        return Err(AppError::BadRequest(format!("invalid sortBy '{other}'")))
                    }
                };
            }
            _ if FACET_NAMES.contains(&key) => {
                params
                    .facets
                    .entry(key.to_string())
                    .or_default()
                    .push(value.into_owned());
            }
            _ => {}
        }
    }

    Ok(params)
}

/// `GET /api/v1/documents`: the published-documents listing.
///
/// Runs under the caller's supersession controller: when the caller issues
/// a newer listing query before this one resolves, the stale result is
/// discarded and the response is 204 so the UI keeps its current state.
pub async fn documents_handler(
    State(state): State<AppState>,
    actor: Actor,
    RawQuery(raw): RawQuery,
) -> Result<Response, AppError> {
    let params = parse_search_params(raw.as_deref())?;
    match state
        .listing
        .published_listing_latest(actor.email(), &params)
        .await?
    {
        Outcome::Applied(listing) => Ok(Json(listing).into_response()),
        Outcome::Superseded => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// `GET /api/v1/drafts`: the caller's drafts. Completeness expected:
/// a draft-store outage fails the request.
pub async fn drafts_handler(
    State(state): State<AppState>,
    actor: Actor,
    RawQuery(raw): RawQuery,
) -> Result<Response, AppError> {
    let params = parse_search_params(raw.as_deref())?;
    let listing = state.listing.draft_listing(actor.email(), &params).await?;
    Ok(Json(listing).into_response())
}

/// `GET /api/v1/me/documents`: drafts and published documents merged into
/// one recency-grouped listing.
pub async fn my_documents_handler(
    State(state): State<AppState>,
    actor: Actor,
    RawQuery(raw): RawQuery,
) -> Result<Response, AppError> {
    let params = parse_search_params(raw.as_deref())?;
    let page = state.listing.my_documents(actor.email(), &params).await?;
    Ok(Json(page).into_response())
}

/// `GET /api/v1/dashboard`: the caller's review queue and a best-effort
/// recent-documents widget.
pub async fn dashboard_handler(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Response, AppError> {
    let dashboard = state.listing.dashboard(actor.email()).await?;
    Ok(Json(dashboard).into_response())
}

/// `GET /api/v1/facets`: annotated facet groups for the current filters.
/// `collection=drafts` selects the caller's draft set; the published index
/// is the default.
pub async fn facets_handler(
    State(state): State<AppState>,
    actor: Actor,
    RawQuery(raw): RawQuery,
) -> Result<Response, AppError> {
    let params = parse_search_params(raw.as_deref())?;

    let collection = raw
        .as_deref()
        .map(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .find(|(key, _)| key == "collection")
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default()
        .unwrap_or_else(|| "documents".to_string());

    let facets = match collection.as_str() {
        "documents" => state.listing.facets(&params).await?,
        "drafts" => state.listing.draft_facets(actor.email(), &params).await?,
        other => {
            return Err(AppError::BadRequest(format!(
                "unknown collection '{other}'"
            )))
        }
    };
    Ok(Json(facets).into_response())
}
