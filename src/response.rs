use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Structured single-key response payload with a stable outcome class.
///
/// Clients key off which field is present (`success`, `warning`, `error`
/// or `link`) rather than parsing the human-readable text.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl ApiMessage {
    pub fn success(msg: &str) -> Self {
        Self {
            success: Some(msg.to_string()),
            warning: None,
            error: None,
            link: None,
        }
    }

    pub fn warning(msg: &str) -> Self {
        Self {
            success: None,
            warning: Some(msg.to_string()),
            error: None,
            link: None,
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            success: None,
            warning: None,
            error: Some(msg.to_string()),
            link: None,
        }
    }

    pub fn link(short_link: &str) -> Self {
        Self {
            success: None,
            warning: None,
            error: None,
            link: Some(short_link.to_string()),
        }
    }
}

impl IntoResponse for ApiMessage {
    fn into_response(self) -> Response {
        let mut response = Json(self).into_response();
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".parse().unwrap());
        response
    }
}
