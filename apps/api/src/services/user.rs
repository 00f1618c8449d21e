//! # User Service
//!
//! Account administration and self-service.
//!
//! ## Admin-created accounts
//! ```text
//! create(password: None)
//!      │
//!      ├─► generate 12-char password, hash, insert user
//!      │
//!      ├─► email the password
//!      │        │
//!      │        ├─ ok ──────► 201 + user
//!      │        └─ failure ─► delete the user, 503 SERVICE_UNAVAILABLE
//! ```
//! The delete above is the only compensating rollback in the back office.

use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use shopdesk_core::validation::{validate_email, validate_password, validate_username};
use shopdesk_core::{AuditAction, Identity, Role, User, ValidationError};
use shopdesk_db::repository::new_id;
use shopdesk_db::Database;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::audit::{snapshot, AuditService};
use super::email::{Email, Mailer};
use super::non_empty;
use crate::auth::password::{generate_password, hash_password, verify_password};
use crate::config::BootstrapAdmin;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Generated and emailed when absent
    #[serde(default)]
    pub password: Option<String>,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolesRequest {
    pub roles: Vec<Role>,
}

#[derive(Clone)]
pub struct UserService {
    db: Database,
    audit: AuditService,
    mailer: Arc<dyn Mailer>,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}

impl UserService {
    pub fn new(db: Database, audit: AuditService, mailer: Arc<dyn Mailer>) -> Self {
        UserService { db, audit, mailer }
    }

    pub async fn list(&self) -> ApiResult<Vec<User>> {
        Ok(self.db.users().list().await?)
    }

    pub async fn get(&self, id: &str) -> ApiResult<User> {
        self.db
            .users()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User", id))
    }

    pub async fn me(&self, actor: &Identity) -> ApiResult<User> {
        self.db
            .users()
            .get_by_username(&actor.username)
            .await?
            .ok_or_else(|| ApiError::not_found("User", &actor.username))
    }

    /// Admin creation. Without a password one is generated and emailed, which
    /// then requires an email address.
    pub async fn create(&self, actor: &Identity, request: CreateUserRequest) -> ApiResult<User> {
        validate_username(&request.username)?;
        validate_roles(&request.roles)?;
        let email = non_empty(request.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let (password, generated) = match non_empty(request.password) {
            Some(password) => {
                validate_password(&password)?;
                (password, false)
            }
            None => {
                if email.is_none() {
                    return Err(ValidationError::Required {
                        field: "email".to_string(),
                    }
                    .into());
                }
                (generate_password(), true)
            }
        };

        let user = self
            .insert_user(request.username.trim(), email, &password, request.roles)
            .await?;

        if generated {
            self.send_generated_password(&user, &password).await?;
        }

        self.audit
            .record(actor, AuditAction::Create, "User", &user.id, None, Some(snapshot(&user)?))
            .await?;
        info!(username = %user.username, roles = ?user.roles, "User created");
        Ok(user)
    }

    /// Self-registration always yields a CUSTOMER.
    pub async fn register(&self, request: RegisterRequest) -> ApiResult<User> {
        validate_username(&request.username)?;
        validate_password(&request.password)?;
        let email = non_empty(request.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let user = self
            .insert_user(request.username.trim(), email, &request.password, vec![Role::Customer])
            .await?;

        let actor = Identity::new(user.username.clone(), user.roles.clone());
        self.audit
            .record(&actor, AuditAction::Create, "User", &user.id, None, Some(snapshot(&user)?))
            .await?;
        info!(username = %user.username, "Customer registered");
        Ok(user)
    }

    /// Replaces the role set; at least one role is required.
    pub async fn replace_roles(&self, actor: &Identity, id: &str, roles: Vec<Role>) -> ApiResult<User> {
        validate_roles(&roles)?;
        let before = self.get(id).await?;

        let mut roles = roles;
        roles.sort();
        roles.dedup();
        self.db.users().update_roles(id, &roles).await?;

        let after = User {
            roles,
            updated_at: Utc::now(),
            ..before.clone()
        };
        self.audit
            .record(actor, AuditAction::Update, "User", id, Some(snapshot(&before)?), Some(snapshot(&after)?))
            .await?;
        info!(username = %after.username, roles = ?after.roles, "Roles replaced");
        Ok(after)
    }

    pub async fn delete(&self, actor: &Identity, id: &str) -> ApiResult<()> {
        let user = self.get(id).await?;
        if user.username == actor.username {
            return Err(ApiError::invalid_operation("You cannot delete your own account"));
        }

        self.db.users().delete(id).await?;
        self.audit
            .record(actor, AuditAction::Delete, "User", id, Some(snapshot(&user)?), None)
            .await?;
        info!(username = %user.username, "User deleted");
        Ok(())
    }

    pub async fn change_password(&self, actor: &Identity, request: ChangePasswordRequest) -> ApiResult<()> {
        let user = self.me(actor).await?;
        if !verify_password(&request.current_password, &user.password_hash) {
            return Err(ApiError::invalid_credentials());
        }
        validate_password(&request.new_password)?;

        let hash = hash_password(&request.new_password)?;
        self.db.users().update_password(&user.id, &hash).await?;

        // The hash itself never goes into the log
        self.audit
            .record(actor, AuditAction::Update, "User", &user.id, None, Some("{\"password\":\"changed\"}".to_string()))
            .await?;
        info!(username = %user.username, "Password changed");
        Ok(())
    }

    /// Creates the configured admin when the username is not taken yet.
    /// Returns whether an account was created.
    pub async fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> ApiResult<bool> {
        if self.db.users().get_by_username(&admin.username).await?.is_some() {
            return Ok(false);
        }

        validate_username(&admin.username)?;
        let user = self
            .insert_user(
                &admin.username,
                admin.email.clone(),
                admin.password.expose_secret(),
                vec![Role::Admin],
            )
            .await?;

        self.audit
            .record(&Identity::system(), AuditAction::Create, "User", &user.id, None, Some(snapshot(&user)?))
            .await?;
        warn!(username = %user.username, "Bootstrap admin created; change its password");
        Ok(true)
    }

    async fn insert_user(
        &self,
        username: &str,
        email: Option<String>,
        password: &str,
        roles: Vec<Role>,
    ) -> ApiResult<User> {
        let now = Utc::now();
        let user = User {
            id: new_id(),
            username: username.to_string(),
            email,
            password_hash: hash_password(password)?,
            roles,
            created_at: now,
            updated_at: now,
        };
        self.db.users().insert(&user).await?;
        Ok(user)
    }

    async fn send_generated_password(&self, user: &User, password: &str) -> ApiResult<()> {
        let Some(to) = user.email.clone() else {
            return Ok(());
        };

        let email = Email {
            to,
            subject: "Your Shopdesk account".to_string(),
            body: format!(
                "Hello {},\n\nAn account has been created for you.\n\nUsername: {}\nPassword: {}\n\nPlease change the password after your first login.\n",
                user.username, user.username, password
            ),
            attachment: None,
        };

        if let Err(e) = self.mailer.send(email).await {
            error!(username = %user.username, error = %e, "Password email failed; removing the account");
            if let Err(rollback) = self.db.users().delete(&user.id).await {
                error!(username = %user.username, error = %rollback, "Failed to remove account after email failure");
            }
            return Err(ApiError::unavailable("Could not send the password email; the user was not created"));
        }
        Ok(())
    }
}

fn validate_roles(roles: &[Role]) -> Result<(), ValidationError> {
    if roles.is_empty() {
        return Err(ValidationError::Required {
            field: "roles".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::email::{EmailError, LogMailer};
    use async_trait::async_trait;
    use shopdesk_db::DbConfig;
    use std::sync::Mutex;

    /// Fails every send.
    struct DownMailer;

    #[async_trait]
    impl Mailer for DownMailer {
        async fn send(&self, _email: Email) -> Result<(), EmailError> {
            Err(EmailError::InvalidAddress("relay down".to_string()))
        }
    }

    #[derive(Default)]
    struct Outbox(Mutex<Vec<Email>>);

    #[async_trait]
    impl Mailer for Outbox {
        async fn send(&self, email: Email) -> Result<(), EmailError> {
            self.0.lock().unwrap().push(email);
            Ok(())
        }
    }

    async fn service(mailer: Arc<dyn Mailer>) -> (UserService, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (UserService::new(db.clone(), AuditService::new(db.clone()), mailer), db)
    }

    fn admin() -> Identity {
        Identity::new("root", vec![Role::Admin])
    }

    fn request(password: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            username: "kim".to_string(),
            email: Some("kim@example.com".to_string()),
            password: password.map(str::to_string),
            roles: vec![Role::Employee],
        }
    }

    #[tokio::test]
    async fn test_generated_password_is_emailed() {
        let outbox = Arc::new(Outbox::default());
        let (service, _) = service(outbox.clone()).await;

        let user = service.create(&admin(), request(None)).await.unwrap();
        assert_eq!(user.roles, vec![Role::Employee]);

        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "kim@example.com");
        assert!(sent[0].body.contains("Username: kim"));
    }

    #[tokio::test]
    async fn test_email_failure_removes_user() {
        let (service, db) = service(Arc::new(DownMailer)).await;

        let err = service.create(&admin(), request(None)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
        assert!(db.users().get_by_username("kim").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_explicit_password_skips_email() {
        let (service, db) = service(Arc::new(DownMailer)).await;

        service.create(&admin(), request(Some("s3cret-pass"))).await.unwrap();
        assert!(db.users().get_by_username("kim").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_roles_must_not_be_empty() {
        let (service, _) = service(Arc::new(LogMailer)).await;
        let user = service.create(&admin(), request(Some("s3cret-pass"))).await.unwrap();

        let err = service.replace_roles(&admin(), &user.id, vec![]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let updated = service
            .replace_roles(&admin(), &user.id, vec![Role::Manager, Role::Employee, Role::Manager])
            .await
            .unwrap();
        assert_eq!(updated.roles, vec![Role::Manager, Role::Employee]);
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let (service, db) = service(Arc::new(LogMailer)).await;
        service
            .register(RegisterRequest {
                username: "ana".to_string(),
                password: "first-pass".to_string(),
                email: None,
            })
            .await
            .unwrap();
        let ana = Identity::new("ana", vec![Role::Customer]);

        let err = service
            .change_password(
                &ana,
                ChangePasswordRequest {
                    current_password: "wrong".to_string(),
                    new_password: "second-pass".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);

        service
            .change_password(
                &ana,
                ChangePasswordRequest {
                    current_password: "first-pass".to_string(),
                    new_password: "second-pass".to_string(),
                },
            )
            .await
            .unwrap();
        let stored = db.users().get_by_username("ana").await.unwrap().unwrap();
        assert!(verify_password("second-pass", &stored.password_hash));
        assert_eq!(stored.roles, vec![Role::Customer]);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_runs_once() {
        let (service, _) = service(Arc::new(LogMailer)).await;
        let admin = BootstrapAdmin {
            username: "admin".to_string(),
            password: secrecy::SecretString::from("admin-pass-123".to_string()),
            email: None,
        };

        assert!(service.bootstrap_admin(&admin).await.unwrap());
        assert!(!service.bootstrap_admin(&admin).await.unwrap());
    }

    #[tokio::test]
    async fn test_cannot_delete_self() {
        let (service, _) = service(Arc::new(LogMailer)).await;
        let root = service
            .create(
                &admin(),
                CreateUserRequest {
                    username: "root".to_string(),
                    email: None,
                    password: Some("root-pass-123".to_string()),
                    roles: vec![Role::Admin],
                },
            )
            .await
            .unwrap();

        let err = service.delete(&admin(), &root.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
    }
}
