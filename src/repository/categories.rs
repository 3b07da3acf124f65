//! Categories repository for PostgreSQL

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::CategoryRepository;
use crate::{
    error::{AppError, AppResult},
    models::{Category, CreateCategoryPayload},
};

#[derive(Clone)]
pub struct CategoriesRepository {
    pool: Pool<Postgres>,
}

impl CategoriesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for CategoriesRepository {
    async fn find_by_codes(&self, codes: &[String]) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, code, name, description, created_at FROM categories WHERE code = ANY($1) ORDER BY code",
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, code, name, description, created_at FROM categories WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, code, name, description, created_at FROM categories ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create(&self, category: &CreateCategoryPayload) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (code, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, code, name, description, created_at
            "#,
        )
        .bind(&category.code)
        .bind(&category.name)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "Category with code {} already exists",
                category.code
            )),
            _ => AppError::Database(err),
        })
    }

    async fn delete(&self, code: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
