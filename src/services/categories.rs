//! Category service

use std::collections::HashSet;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{Category, CreateCategoryPayload},
    repository::Repository,
};

#[derive(Clone)]
pub struct CategoryService {
    repository: Repository,
}

impl CategoryService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Categories matching the given codes; unknown codes are skipped
    pub async fn find_by_category_codes(&self, codes: &HashSet<String>) -> AppResult<Vec<Category>> {
        let codes: Vec<String> = codes.iter().cloned().collect();
        self.repository.categories.find_by_codes(&codes).await
    }

    pub async fn list(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.list().await
    }

    pub async fn get_by_code(&self, code: &str) -> AppResult<Category> {
        self.repository
            .categories
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", code)))
    }

    pub async fn create(&self, data: &CreateCategoryPayload) -> AppResult<Category> {
        data.validate()?;
        let category = self.repository.categories.create(data).await?;
        tracing::info!(code = %category.code, "Category created");
        Ok(category)
    }

    /// Delete a category; its book associations are dropped with it
    pub async fn delete(&self, code: &str) -> AppResult<()> {
        if !self.repository.categories.delete(code).await? {
            return Err(AppError::NotFound(format!("Category {} not found", code)));
        }
        tracing::info!(code, "Category deleted");
        Ok(())
    }
}
