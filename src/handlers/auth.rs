use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::FromRequest,
    http::Request,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";

/// Request body whose `x-signature` header has been checked against the
/// configured signing secret. Passes through unchecked when no secret is set.
pub struct SignedBody(pub Bytes);

/// Hex-encoded HMAC-SHA256 of `body`.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("Invalid signing secret configuration".to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(secret: &str, body: &[u8], signature_header: &str) -> Result<(), AppError> {
    let expected_signature = hex::decode(signature_header.trim())
        .map_err(|_| AppError::Unauthorized("Invalid signature format".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("Invalid signing secret configuration".to_string()))?;
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&expected_signature)
        .map_err(|_| AppError::Unauthorized("Signature verification failed".to_string()))
}

#[async_trait]
impl FromRequest<AppState, Body> for SignedBody {
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &AppState) -> Result<Self, Self::Rejection> {
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|_| AppError::BadRequest("Failed to read request body".to_string()))?;

        if let Some(secret) = &state.signing_secret {
            let signature = signature.ok_or_else(|| {
                tracing::warn!("Status update rejected: missing signature header");
                AppError::Unauthorized(format!("Missing {} header", SIGNATURE_HEADER))
            })?;
            verify_signature(secret, &body, &signature).map_err(|e| {
                tracing::warn!(error = %e, "Status update rejected");
                e
            })?;
        }

        Ok(SignedBody(body))
    }
}
