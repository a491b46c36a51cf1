use axum::extract::rejection::JsonRejection;
use axum::extract::{Host, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::error::ApiError;
use crate::keys;
use crate::middleware::Identity;
use crate::rate_gate::RateGate;
use crate::redirect;
use crate::registry::{Admission, Registry};
use crate::response::ApiMessage;
use crate::validation;
use crate::verify::VerificationStatus;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Registry,
    pub rate_gate: RateGate,
}

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

fn require_admin(config: &Config, query: &AdminQuery) -> Result<(), ApiError> {
    match &query.api_key {
        Some(key) if *key == config.admin_key => Ok(()),
        _ => Err(ApiError::Unauthorized(
            "the API key provided is incorrect or missing".to_string(),
        )),
    }
}

fn require_valid_id(id: &str) -> Result<(), ApiError> {
    if keys::is_valid_id(id) {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "the link id is malformed".to_string(),
        ))
    }
}

/// Handles `GET /urls`: admin-only dump of the whole registry.
pub async fn list_links(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Response, ApiError> {
    require_admin(&state.config, &query)?;

    let entries = state.registry.dump().await?;
    if entries.is_empty() {
        return Ok(ApiMessage::success("the registry holds no links yet").into_response());
    }
    Ok((StatusCode::OK, Json(entries)).into_response())
}

/// Handles `GET /url/{id}`: public redirect to the stored long URL.
pub async fn redirect_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_valid_id(&id)?;

    let record = state
        .registry
        .lookup(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no record of link {} exists", id)))?;

    let status = redirect::resolve(&record);
    Ok((status, [(header::LOCATION, record.long_url)]).into_response())
}

/// Handles `POST /post-url`: registers a long URL and answers with its short
/// link. Dedup hits answer 200 with the existing link; fresh writes
/// answer 201 once the daily quota admits them.
pub async fn post_url(
    State(state): State<AppState>,
    Extension(Identity(identity)): Extension<Identity>,
    Host(host): Host,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|_| {
        ApiError::Validation("the body of the POST request is not valid JSON".to_string())
    })?;

    let long_url = validation::extract_long_url(&body)?;
    let normalized = keys::normalize_url(&long_url)
        .filter(|normalized| validation::is_valid_url(normalized))
        .ok_or_else(|| {
            ApiError::Validation("the provided long_url is not a valid URL".to_string())
        })?;

    if normalized.len() > state.config.max_url_length {
        return Err(ApiError::Validation(format!(
            "the URL is too long ({} characters), maximum allowed is {}",
            normalized.len(),
            state.config.max_url_length
        )));
    }

    let key = keys::derive_key(&normalized, state.config.short_key_length);
    let origin = request_origin(&headers, &host);

    match state.registry.admit(&key, &normalized).await? {
        Admission::Existing(_) => {
            Ok(ApiMessage::link(&format!("{}/url/{}", origin, key)).into_response())
        }
        Admission::Vacant => {
            if !state.rate_gate.allow_write_quota(&identity).await {
                return Err(ApiError::RateLimited(format!(
                    "maximum of {} write requests allowed per day",
                    state.config.max_daily_writes
                )));
            }

            state.registry.create(&key, &normalized).await?;
            Ok((
                StatusCode::CREATED,
                ApiMessage::link(&format!("{}/url/{}", origin, key)),
            )
                .into_response())
        }
    }
}

/// Handles `PATCH /verify/{id}`: admin-only verification transition.
pub async fn verify_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AdminQuery>,
) -> Result<Response, ApiError> {
    require_admin(&state.config, &query)?;
    require_valid_id(&id)?;

    match state.registry.verify(&id).await {
        VerificationStatus::VerifiedNow => {
            Ok(ApiMessage::success("the link has been verified successfully").into_response())
        }
        VerificationStatus::AlreadyVerified => {
            Ok(ApiMessage::warning("this link is already verified").into_response())
        }
        VerificationStatus::NotFound => Err(ApiError::NotFound(format!(
            "no record of link {} exists",
            id
        ))),
        VerificationStatus::Error => Err(ApiError::Upstream(
            "the verification write did not land".to_string(),
        )),
    }
}

/// Handles `DELETE /delete/{id}`: admin-only removal.
pub async fn delete_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AdminQuery>,
) -> Result<Response, ApiError> {
    require_admin(&state.config, &query)?;
    require_valid_id(&id)?;

    if state.registry.delete(&id).await? {
        Ok(ApiMessage::success("the link has been deleted correctly").into_response())
    } else {
        Err(ApiError::NotFound(format!(
            "no record of link {} exists",
            id
        )))
    }
}

/// Fallback for unknown paths.
pub async fn unknown_endpoint() -> ApiError {
    ApiError::NotFound("the requested endpoint is invalid".to_string())
}

/// Public origin for minted links: forwarded proto if the edge set one,
/// otherwise https, which is what deployed instances terminate.
fn request_origin(headers: &HeaderMap, host: &str) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("https");
    format!("{}://{}", proto, host)
}
