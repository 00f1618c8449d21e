//! Login and token refresh.
//!
//! ```text
//! login(username, password)
//!   unknown user ──┐
//!   bad password ──┴──► INVALID_CREDENTIALS   (same answer for both)
//!   ok ───────────────► access token (body) + refresh token (cookie)
//!
//! refresh(refresh token)
//!   validate ──► re-read the user ──► tokens carrying the CURRENT roles
//! ```

use serde::Serialize;
use shopdesk_core::{AuditAction, Identity, Role, User};
use shopdesk_db::Database;
use tracing::{info, warn};

use super::audit::AuditService;
use crate::auth::password::verify_password;
use crate::auth::JwtManager;
use crate::error::{ApiError, ApiResult};

/// Body of a successful login or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub username: String,
    pub roles: Vec<Role>,
}

/// Access token for the body plus the refresh token for the cookie.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access: AccessToken,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    db: Database,
    jwt: JwtManager,
    audit: AuditService,
}

impl AuthService {
    pub fn new(db: Database, jwt: JwtManager, audit: AuditService) -> Self {
        AuthService { db, jwt, audit }
    }

    pub async fn login(&self, username: &str, password: &str) -> ApiResult<IssuedTokens> {
        let user = self.db.users().get_by_username(username.trim()).await?;

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => {
                warn!(username = %username, "Failed login attempt");
                return Err(ApiError::invalid_credentials());
            }
        };

        let tokens = self.issue(&user)?;
        let actor = Identity::new(user.username.clone(), user.roles.clone());
        self.audit
            .record(&actor, AuditAction::Login, "User", &user.id, None, None)
            .await?;

        info!(username = %user.username, "User logged in");
        Ok(tokens)
    }

    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<IssuedTokens> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;

        // A deleted account cannot refresh
        let user = self
            .db
            .users()
            .get_by_username(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::invalid_token("User no longer exists"))?;

        self.issue(&user)
    }

    fn issue(&self, user: &User) -> ApiResult<IssuedTokens> {
        let access_token = self.jwt.generate_access_token(&user.username, &user.roles)?;
        let refresh_token = self.jwt.generate_refresh_token(&user.username, &user.roles)?;

        Ok(IssuedTokens {
            access: AccessToken {
                access_token,
                token_type: "Bearer",
                expires_in: self.jwt.access_lifetime_secs(),
                username: user.username.clone(),
                roles: user.roles.clone(),
            },
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::error::ErrorCode;
    use chrono::Utc;
    use secrecy::SecretString;
    use shopdesk_db::repository::new_id;
    use shopdesk_db::DbConfig;

    async fn setup() -> (AuthService, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let jwt = JwtManager::new(
            &SecretString::from("test-secret-that-is-long-enough-0001".to_string()),
            900,
            3600,
        );
        let now = Utc::now();
        db.users()
            .insert(&User {
                id: new_id(),
                username: "mia".to_string(),
                email: None,
                password_hash: hash_password("manager-pass").unwrap(),
                roles: vec![Role::Manager],
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        (AuthService::new(db.clone(), jwt, AuditService::new(db.clone())), db)
    }

    #[tokio::test]
    async fn test_login_success_and_uniform_failure() {
        let (service, _) = setup().await;

        let tokens = service.login("mia", "manager-pass").await.unwrap();
        assert_eq!(tokens.access.roles, vec![Role::Manager]);
        assert_eq!(tokens.access.expires_in, 900);

        let wrong_password = service.login("mia", "nope").await.unwrap_err();
        let unknown_user = service.login("ghost", "manager-pass").await.unwrap_err();
        assert_eq!(wrong_password.code, ErrorCode::InvalidCredentials);
        assert_eq!(wrong_password.message, unknown_user.message);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_role_changes() {
        let (service, db) = setup().await;
        let tokens = service.login("mia", "manager-pass").await.unwrap();

        let mia = db.users().get_by_username("mia").await.unwrap().unwrap();
        db.users().update_roles(&mia.id, &[Role::Admin]).await.unwrap();

        let refreshed = service.refresh(&tokens.refresh_token).await.unwrap();
        assert_eq!(refreshed.access.roles, vec![Role::Admin]);

        // An access token is not a refresh token
        let err = service.refresh(&tokens.access.access_token).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
    }
}
