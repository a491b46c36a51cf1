//! Redirect status selection for resolved links.

use axum::http::StatusCode;

use crate::store::LinkRecord;

/// Unverified links answer with a temporary redirect so browsers and
/// caches keep re-checking them until an administrator confirms the
/// target; verified links may be cached permanently by clients.
pub fn resolve(record: &LinkRecord) -> StatusCode {
    if record.is_verified {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::FOUND
    }
}
