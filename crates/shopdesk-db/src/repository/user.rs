//! # User Repository
//!
//! The credential store. Roles are stored as a comma separated list and
//! decoded into `Vec<Role>` on the way out.

use chrono::{DateTime, Utc};
use shopdesk_core::{Role, User};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const USER_COLUMNS: &str = "id, username, email, password_hash, roles, created_at, updated_at";

/// Raw `users` row.
#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: Option<String>,
    password_hash: String,
    roles: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let roles = Role::parse_list(&row.roles).map_err(|e| DbError::Decode {
            entity: "user".to_string(),
            message: e.to_string(),
        })?;

        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            roles,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts a user.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - username already taken
    pub async fn insert(&self, user: &User) -> DbResult<()> {
        debug!(username = %user.username, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, roles, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(Role::join_list(&user.roles))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(&user.username))?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn update_roles(&self, id: &str, roles: &[Role]) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET roles = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(Role::join_list(roles))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn update_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(password_hash)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Hard delete. Users are the one collection without a lifecycle.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting user");

        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{new_id, test_support};

    fn user(username: &str, roles: Vec<Role>) -> User {
        let now = Utc::now();
        User {
            id: new_id(),
            username: username.to_string(),
            email: Some(format!("{username}@example.com")),
            password_hash: "hash".to_string(),
            roles,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = test_support::db().await;
        let repo = db.users();

        let ana = user("ana", vec![Role::Admin, Role::Manager]);
        repo.insert(&ana).await.unwrap();

        let loaded = repo.get_by_username("ana").await.unwrap().unwrap();
        assert_eq!(loaded.id, ana.id);
        assert_eq!(loaded.roles, vec![Role::Admin, Role::Manager]);
        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let db = test_support::db().await;
        let repo = db.users();

        repo.insert(&user("ana", vec![Role::Customer])).await.unwrap();
        let err = repo
            .insert(&user("ana", vec![Role::Customer]))
            .await
            .unwrap_err();

        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "username");
                assert_eq!(value, "ana");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_roles_and_delete() {
        let db = test_support::db().await;
        let repo = db.users();

        let kim = user("kim", vec![Role::Employee]);
        repo.insert(&kim).await.unwrap();
        repo.update_roles(&kim.id, &[Role::Manager]).await.unwrap();
        assert_eq!(
            repo.get_by_id(&kim.id).await.unwrap().unwrap().roles,
            vec![Role::Manager]
        );

        repo.delete(&kim.id).await.unwrap();
        assert!(repo.get_by_id(&kim.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&kim.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
