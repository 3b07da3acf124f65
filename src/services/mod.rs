//! Business logic services

pub mod auth;
pub mod books;
pub mod categories;
pub mod storage;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub books: books::BookService,
    pub categories: categories::CategoryService,
    pub storage: storage::StorageService,
}

impl Services {
    /// Create all services with the given repository
    pub async fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let storage = storage::StorageService::new(&config.storage);
        storage.init().await?;

        let categories = categories::CategoryService::new(repository.clone());

        Ok(Self {
            auth: auth::AuthService::new(config.auth.clone()),
            books: books::BookService::new(repository, categories.clone(), storage.clone()),
            categories,
            storage,
        })
    }
}
