//! Caller identity taken from headers set by the upstream identity layer.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::principal::{Principal, PrincipalRole};

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";
pub const DEVICE_ID_HEADER: &str = "x-device-id";

pub async fn require_principal(mut req: Request, next: Next) -> Result<Response, AppError> {
    let principal = principal_from_headers(req.headers())?;
    tracing::debug!(
        principal_id = %principal.id,
        role = principal.role.as_str(),
        "Resolved caller"
    );
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

pub fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, AppError> {
    let id = header_str(headers, PRINCIPAL_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("missing principal".into()))?;
    let id = Uuid::parse_str(id)
        .map_err(|_| AppError::Unauthorized("invalid principal id".into()))?;
    let role = header_str(headers, PRINCIPAL_ROLE_HEADER)
        .ok_or_else(|| AppError::Unauthorized("missing principal role".into()))?
        .parse::<PrincipalRole>()
        .map_err(AppError::Unauthorized)?;
    let device_id = header_str(headers, DEVICE_ID_HEADER)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    Ok(Principal {
        id,
        role,
        device_id,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}
