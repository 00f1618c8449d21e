//! JWT token management.
//!
//! Access and refresh tokens share a secret and a claim shape; they differ in
//! lifetime and `token_type`, and each validator rejects the other kind.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shopdesk_core::{Identity, Role};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,

    /// Roles at issue time
    pub roles: Vec<Role>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,

    /// Token type ("access" or "refresh")
    pub token_type: String,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity::new(self.sub.clone(), self.roles.clone())
    }
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_lifetime_secs: i64,
    refresh_lifetime_secs: i64,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("access_lifetime_secs", &self.access_lifetime_secs)
            .field("refresh_lifetime_secs", &self.refresh_lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: &SecretString, access_lifetime_secs: i64, refresh_lifetime_secs: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        JwtManager {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            access_lifetime_secs,
            refresh_lifetime_secs,
        }
    }

    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime_secs
    }

    pub fn refresh_lifetime_secs(&self) -> i64 {
        self.refresh_lifetime_secs
    }

    /// Generate an access token.
    pub fn generate_access_token(&self, username: &str, roles: &[Role]) -> ApiResult<String> {
        self.generate(username, roles, ACCESS, self.access_lifetime_secs)
    }

    /// Generate a refresh token.
    pub fn generate_refresh_token(&self, username: &str, roles: &[Role]) -> ApiResult<String> {
        self.generate(username, roles, REFRESH, self.refresh_lifetime_secs)
    }

    fn generate(
        &self,
        username: &str,
        roles: &[Role],
        token_type: &str,
        lifetime_secs: i64,
    ) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(lifetime_secs);

        let claims = Claims {
            sub: username.to_string(),
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate {token_type} token: {e}")))
    }

    /// Validate signature and expiry (no leeway) and decode a token.
    pub fn validate_token(&self, token: &str) -> ApiResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| ApiError::invalid_token(format!("Invalid token: {e}")))
    }

    /// Validate that a token is an access token.
    pub fn validate_access_token(&self, token: &str) -> ApiResult<Claims> {
        let claims = self.validate_token(token)?;

        if claims.token_type != ACCESS {
            return Err(ApiError::invalid_token("Expected access token"));
        }

        Ok(claims)
    }

    /// Validate that a token is a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> ApiResult<Claims> {
        let claims = self.validate_token(token)?;

        if claims.token_type != REFRESH {
            return Err(ApiError::invalid_token("Expected refresh token"));
        }

        Ok(claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn manager(secret: &str) -> JwtManager {
        JwtManager::new(&SecretString::from(secret.to_string()), 3600, 86400)
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = manager("test-secret-that-is-long-enough-0001");

        let token = manager
            .generate_access_token("ana", &[Role::Admin, Role::Manager])
            .unwrap();
        let claims = manager.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, "ana");
        assert_eq!(claims.roles, vec![Role::Admin, Role::Manager]);
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.identity().username, "ana");
    }

    #[test]
    fn test_wrong_token_type() {
        let manager = manager("test-secret-that-is-long-enough-0001");

        let access = manager.generate_access_token("ana", &[Role::Customer]).unwrap();
        let refresh = manager.generate_refresh_token("ana", &[Role::Customer]).unwrap();

        assert!(manager.validate_refresh_token(&access).is_err());
        assert!(manager.validate_access_token(&refresh).is_err());
        assert_eq!(manager.validate_refresh_token(&refresh).unwrap().token_type, "refresh");
    }

    #[test]
    fn test_foreign_secret_and_tampering() {
        let ours = manager("test-secret-that-is-long-enough-0001");
        let theirs = manager("another-secret-that-is-long-enough-2");

        let token = theirs.generate_access_token("ana", &[Role::Admin]).unwrap();
        let err = ours.validate_access_token(&token).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);

        let mut tampered = ours.generate_access_token("ana", &[Role::Customer]).unwrap();
        tampered.push('x');
        assert!(ours.validate_access_token(&tampered).is_err());
        assert!(ours.validate_access_token("not-a-jwt").is_err());
    }

    #[test]
    fn test_expired_token() {
        let secret = SecretString::from("test-secret-that-is-long-enough-0001".to_string());
        let manager = JwtManager::new(&secret, -10, -10);
        let token = manager.generate_access_token("ana", &[Role::Admin]).unwrap();
        assert!(manager.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
