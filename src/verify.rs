//! Verification state machine: unverified to verified, once.

use tracing::{info, warn};

use crate::store::LinkStore;

/// Outcome of a verification attempt. `unverified -> verified` is the
/// only transition; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    VerifiedNow,
    AlreadyVerified,
    NotFound,
    Error,
}

/// Idempotently marks the record under `key` as verified.
///
/// A second call on the same key reports `AlreadyVerified` without
/// touching the store. The mutation is a partial update, so the rest of
/// the record is never rewritten.
pub async fn verify(store: &dyn LinkStore, key: &str) -> VerificationStatus {
    let record = match store.get(key).await {
        Ok(Some(record)) => record,
        Ok(None) => return VerificationStatus::NotFound,
        Err(e) => {
            warn!(key, error = %e, "verification lookup failed");
            return VerificationStatus::NotFound;
        }
    };

    if record.is_verified {
        return VerificationStatus::AlreadyVerified;
    }

    match store.set_verified(key).await {
        Ok(()) => {
            info!(key, "link verified");
            VerificationStatus::VerifiedNow
        }
        Err(e) => {
            warn!(key, error = %e, "verification write failed");
            VerificationStatus::Error
        }
    }
}
