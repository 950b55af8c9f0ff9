//! Credential verification port.

use jugo_types::error::AuthError;
use jugo_types::work::UserId;

/// Resolves an opaque credential (API key or connection token) to a caller.
pub trait CredentialVerifier: Send + Sync {
    /// Returns [`AuthError::Invalid`] for unknown credentials.
    fn verify(
        &self,
        credential: &str,
    ) -> impl std::future::Future<Output = Result<UserId, AuthError>> + Send;
}
