//! Caller identity forwarded by the upstream gateway
//!
//! The gateway authenticates the caller and sets `x-supplier-id` and
//! `x-user-id`. Handlers that act on behalf of a supplier take
//! [`SupplierIdentity`] as an extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

pub const SUPPLIER_ID_HEADER: &str = "x-supplier-id";
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplierIdentity {
    pub supplier_id: Uuid,
    pub user_id: Uuid,
}

fn uuid_header(parts: &Parts, name: &str) -> Result<Uuid, AppError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", name)))?;

    value
        .to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized(format!("Invalid {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for SupplierIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            supplier_id: uuid_header(parts, SUPPLIER_ID_HEADER)?,
            user_id: uuid_header(parts, USER_ID_HEADER)?,
        })
    }
}
