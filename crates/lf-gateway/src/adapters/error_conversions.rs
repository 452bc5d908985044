//! Error conversions from infrastructure types.
//!
//! These conversions decide what a client sees and belong in the adapters layer.

use crate::domain::{ApiError, ChallengeError, StoreError};
use tracing::error;

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "Storage failure while serving request");
        ApiError::internal()
    }
}

impl From<ChallengeError> for ApiError {
    fn from(_: ChallengeError) -> Self {
        ApiError::invalid_proof()
    }
}
