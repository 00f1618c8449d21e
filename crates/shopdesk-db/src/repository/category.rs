//! # Category Repository

use chrono::Utc;
use shopdesk_core::{CatalogStatus, Category, Visibility};
use sqlx::SqlitePool;
use tracing::debug;

use super::{like_pattern, visibility_predicate};
use crate::error::{DbError, DbResult};

const CATEGORY_COLUMNS: &str = "id, name, description, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn insert(&self, category: &Category) -> DbResult<()> {
        debug!(name = %category.name, "Inserting category");

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.status)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a category by id, archived or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn list(&self, visibility: Visibility) -> DbResult<Vec<Category>> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE {} ORDER BY name",
            visibility_predicate(visibility)
        );
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    /// Case-insensitive substring search on name and description.
    pub async fn search(&self, query: &str, visibility: Visibility) -> DbResult<Vec<Category>> {
        let sql = format!(
            r#"
            SELECT {CATEGORY_COLUMNS} FROM categories
            WHERE {}
              AND (LOWER(name) LIKE ?1 ESCAPE '\' OR LOWER(COALESCE(description, '')) LIKE ?1 ESCAPE '\')
            ORDER BY name
            "#,
            visibility_predicate(visibility)
        );
        let categories = sqlx::query_as::<_, Category>(&sql)
            .bind(like_pattern(query))
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn update(&self, category: &Category) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE categories SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", &category.id));
        }
        Ok(())
    }

    /// Archives or restores a category.
    pub async fn set_status(&self, id: &str, status: CatalogStatus) -> DbResult<()> {
        debug!(id = %id, ?status, "Changing category status");

        let result =
            sqlx::query("UPDATE categories SET status = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(status)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        Ok(())
    }

    pub async fn count(&self, visibility: Visibility) -> DbResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM categories WHERE {}",
            visibility_predicate(visibility)
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{new_id, test_support};

    fn category(name: &str) -> Category {
        let now = Utc::now();
        Category {
            id: new_id(),
            name: name.to_string(),
            description: Some(format!("All {name}")),
            status: CatalogStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_archived_hidden_from_list_but_retrievable() {
        let db = test_support::db().await;
        let repo = db.categories();

        let drinks = category("Drinks");
        let snacks = category("Snacks");
        repo.insert(&drinks).await.unwrap();
        repo.insert(&snacks).await.unwrap();
        repo.set_status(&snacks.id, CatalogStatus::Archived)
            .await
            .unwrap();

        let active = repo.list(Visibility::ActiveOnly).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Drinks");
        assert_eq!(repo.list(Visibility::IncludeArchived).await.unwrap().len(), 2);

        let archived = repo.get_by_id(&snacks.id).await.unwrap().unwrap();
        assert_eq!(archived.status, CatalogStatus::Archived);
        assert_eq!(repo.count(Visibility::ActiveOnly).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search() {
        let db = test_support::db().await;
        let repo = db.categories();
        repo.insert(&category("Soft Drinks")).await.unwrap();
        repo.insert(&category("Bakery")).await.unwrap();

        let found = repo.search("drink", Visibility::ActiveOnly).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Soft Drinks");
    }
}
