//! Caller identity for cart routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::CustomerId;

use crate::error::ApiError;

/// Header carrying the authenticated customer's ID, set by the session front.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

/// The authenticated customer making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentCustomer(pub CustomerId);

impl<S> FromRequestParts<S> for CurrentCustomer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CUSTOMER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing customer identity".to_string()))?;

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|id| CurrentCustomer(CustomerId::new(id)))
            .ok_or_else(|| ApiError::Unauthorized("malformed customer identity".to_string()))
    }
}
