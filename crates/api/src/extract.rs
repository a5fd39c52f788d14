//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::OwnerId;

use crate::error::ApiError;

/// Header carrying the id of the user the request acts for.
pub const OWNER_HEADER: &str = "x-owner-id";

/// The authenticated owner of a request.
///
/// Every ledger route is owner-scoped; a request without a well-formed
/// `x-owner-id` header is rejected before any handler runs.
#[derive(Debug, Clone, Copy)]
pub struct Owner(pub OwnerId);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing x-owner-id header".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Invalid x-owner-id header".to_string()))?;

        OwnerId::parse(raw.trim())
            .map(Owner)
            .map_err(|_| ApiError::Unauthorized("Invalid x-owner-id header".to_string()))
    }
}
