//! # Supplier Repository
//!
//! Supplier names are unique across active and archived rows alike.

use chrono::Utc;
use shopdesk_core::{CatalogStatus, Supplier, Visibility};
use sqlx::SqlitePool;
use tracing::debug;

use super::{like_pattern, visibility_predicate};
use crate::error::{DbError, DbResult};

const SUPPLIER_COLUMNS: &str =
    "id, name, contact_name, email, phone, address, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - name already used
    pub async fn insert(&self, supplier: &Supplier) -> DbResult<()> {
        debug!(name = %supplier.name, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (
                id, name, contact_name, email, phone, address, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(supplier.status)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(&supplier.name))?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let sql = format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = ?1");
        let supplier = sqlx::query_as::<_, Supplier>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(supplier)
    }

    pub async fn list(&self, visibility: Visibility) -> DbResult<Vec<Supplier>> {
        let sql = format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE {} ORDER BY name",
            visibility_predicate(visibility)
        );
        let suppliers = sqlx::query_as::<_, Supplier>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(suppliers)
    }

    /// Matches name, contact name or email.
    pub async fn search(&self, query: &str, visibility: Visibility) -> DbResult<Vec<Supplier>> {
        let sql = format!(
            r#"
            SELECT {SUPPLIER_COLUMNS} FROM suppliers
            WHERE {}
              AND (
                LOWER(name) LIKE ?1 ESCAPE '\'
                OR LOWER(COALESCE(contact_name, '')) LIKE ?1 ESCAPE '\'
                OR LOWER(COALESCE(email, '')) LIKE ?1 ESCAPE '\'
              )
            ORDER BY name
            "#,
            visibility_predicate(visibility)
        );
        let suppliers = sqlx::query_as::<_, Supplier>(&sql)
            .bind(like_pattern(query))
            .fetch_all(&self.pool)
            .await?;
        Ok(suppliers)
    }

    pub async fn update(&self, supplier: &Supplier) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE suppliers SET
                name = ?2,
                contact_name = ?3,
                email = ?4,
                phone = ?5,
                address = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(&supplier.name))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", &supplier.id));
        }
        Ok(())
    }

    pub async fn set_status(&self, id: &str, status: CatalogStatus) -> DbResult<()> {
        debug!(id = %id, ?status, "Changing supplier status");

        let result =
            sqlx::query("UPDATE suppliers SET status = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(status)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }
        Ok(())
    }

    pub async fn count(&self, visibility: Visibility) -> DbResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM suppliers WHERE {}",
            visibility_predicate(visibility)
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}
