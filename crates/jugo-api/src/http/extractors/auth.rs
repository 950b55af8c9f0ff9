//! API key authentication extractor.
//!
//! Reads the key from `Authorization: Bearer <key>` or `X-API-Key: <key>`
//! and resolves it to the owning user through the credential store.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use jugo_core::repository::credential::CredentialVerifier;
use jugo_types::error::AuthError;
use jugo_types::work::UserId;

use crate::http::error::AppError;
use crate::state::AppState;

/// The caller of an authenticated request.
pub struct Authenticated(pub UserId);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = extract_api_key(&parts.headers)?;
        let user_id = state.credentials.verify(&api_key).await?;
        Ok(Authenticated(user_id))
    }
}

/// Extract the API key from request headers.
fn extract_api_key(headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(auth) = headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| AuthError::Invalid)?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    if let Some(key) = headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| AuthError::Invalid)?;
        return Ok(key_str.trim().to_string());
    }

    Err(AuthError::Missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer jugo_abc "));
        assert_eq!(extract_api_key(&headers).unwrap(), "jugo_abc");
    }

    #[test]
    fn test_x_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("jugo_def"));
        assert_eq!(extract_api_key(&headers).unwrap(), "jugo_def");
    }

    #[test]
    fn test_non_bearer_authorization_falls_back_to_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic Zm9v"));
        assert!(matches!(extract_api_key(&headers), Err(AuthError::Missing)));

        headers.insert("x-api-key", HeaderValue::from_static("jugo_ghi"));
        assert_eq!(extract_api_key(&headers).unwrap(), "jugo_ghi");
    }
}
