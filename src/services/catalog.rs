//! Catalog management service

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{BookQuery, BookSearchQuery},
        Book, CreateBook, PageRequest, UpdateBook,
    },
    repository::CirculationStore,
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CirculationStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CirculationStore>) -> Self {
        Self { store }
    }

    /// List books with pagination
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let mut session = self.store.begin().await?;
        session
            .list_books(PageRequest::new(query.page, query.per_page))
            .await
    }

    /// Search books by title and author (or a single field)
    pub async fn search_books(&self, query: &BookSearchQuery) -> AppResult<(Vec<Book>, i64)> {
        let needle = query.query.trim();
        if needle.is_empty() {
            return Err(AppError::Validation("Search query must not be empty".to_string()));
        }

        let mut session = self.store.begin().await?;
        session
            .search_books(needle, query.field, PageRequest::new(query.page, query.per_page))
            .await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        let mut session = self.store.begin().await?;
        session.get_book(id).await
    }

    /// Create a new book
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;

        let mut session = self.store.begin().await?;
        let created = session.create_book(&book).await?;
        session.commit().await?;

        tracing::info!("Catalog create: book id={} isbn={}", created.id, created.isbn);
        Ok(created)
    }

    /// Update an existing book
    pub async fn update_book(&self, id: Uuid, book: UpdateBook) -> AppResult<Book> {
        book.validate()?;

        let mut session = self.store.begin().await?;
        let updated = session.update_book(id, &book).await?;
        session.commit().await?;
        Ok(updated)
    }

    /// Delete a book that no transaction references
    pub async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        let mut session = self.store.begin().await?;
        session.delete_book(id).await?;
        session.commit().await?;

        tracing::info!("Catalog delete: book id={}", id);
        Ok(())
    }
}
