//! Request payload validation for the write path.

use serde_json::Value;
use url::Url;

use crate::error::ApiError;

/// Accepts http/https URLs with a real dotted hostname. Loopback hosts
/// are refused so the service cannot be used to mint redirects into
/// itself or the local network.
pub fn is_valid_url(candidate: &str) -> bool {
    let Ok(parsed) = Url::parse(candidate) else {
        return false;
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }

    let Some(host) = parsed.host_str() else {
        return false;
    };

    if matches!(host, "localhost" | "127.0.0.1" | "[::1]") {
        return false;
    }

    host.contains('.') && !host.ends_with('.') && !host.split('.').any(|label| label.is_empty())
}

/// Extracts `long_url` from a POST body that must contain exactly that
/// one field and nothing else.
pub fn extract_long_url(body: &Value) -> Result<String, ApiError> {
    let object = body.as_object().ok_or_else(|| {
        ApiError::Validation("the request body must be a JSON object".to_string())
    })?;

    if object.len() != 1 || !object.contains_key("long_url") {
        return Err(ApiError::Validation(
            "the body must contain exactly one field, 'long_url'".to_string(),
        ));
    }

    let long_url = object
        .get("long_url")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if long_url.is_empty() {
        return Err(ApiError::Validation(
            "the field 'long_url' is required but missing".to_string(),
        ));
    }

    Ok(long_url.to_string())
}
