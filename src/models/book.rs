//! Book (catalog entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub authors: Vec<String>,
    pub isbn: String,
    pub publisher: Option<String>,
    /// Copies currently on the shelf
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Case-insensitive substring match on the given field (title or authors when `None`).
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str, field: Option<SearchField>) -> bool {
        let title = || self.title.to_lowercase().contains(needle);
        let author = || self.authors.iter().any(|a| a.to_lowercase().contains(needle));
        match field {
            Some(SearchField::Title) => title(),
            Some(SearchField::Author) => author(),
            Some(SearchField::Isbn) => self.isbn.to_lowercase().contains(needle),
            None => title() || author(),
        }
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[validate(length(min = 1, message = "ISBN must not be empty"))]
    pub isbn: String,
    pub publisher: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
}

/// Update book request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    #[validate(length(min = 1, message = "ISBN must not be empty"))]
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
}

/// Field a book search is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Author,
    Isbn,
}

/// Book list query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Book search query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BookSearchQuery {
    /// Substring to look for
    pub query: String,
    /// Restrict to one field (title and authors are searched when absent)
    pub field: Option<SearchField>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
