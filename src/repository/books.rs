//! Book queries

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use super::like_pattern;
use crate::{
    error::{AppError, AppResult, Entity},
    models::{Book, CreateBook, PageRequest, SearchField, UpdateBook},
};

const BOOK_COLUMNS: &str =
    "id, title, authors, isbn, publisher, stock, created_at, updated_at";

/// Get book by ID
pub async fn get_by_id(conn: &mut PgConnection, id: Uuid) -> AppResult<Book> {
    sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(Entity::Book, id))
}

/// List books, oldest first
pub async fn list(conn: &mut PgConnection, page: PageRequest) -> AppResult<(Vec<Book>, i64)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(&mut *conn)
        .await?;

    let books = sqlx::query_as::<_, Book>(&format!(
        "SELECT {} FROM books ORDER BY created_at, id LIMIT $1 OFFSET $2",
        BOOK_COLUMNS
    ))
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(&mut *conn)
    .await?;

    Ok((books, total))
}

/// Search books by case-insensitive substring
pub async fn search(
    conn: &mut PgConnection,
    query: &str,
    field: Option<SearchField>,
    page: PageRequest,
) -> AppResult<(Vec<Book>, i64)> {
    let condition = match field {
        Some(SearchField::Title) => "LOWER(title) LIKE $1",
        Some(SearchField::Author) => {
            "EXISTS (SELECT 1 FROM unnest(authors) a WHERE LOWER(a) LIKE $1)"
        }
        Some(SearchField::Isbn) => "LOWER(isbn) LIKE $1",
        None => {
            "(LOWER(title) LIKE $1 \
             OR EXISTS (SELECT 1 FROM unnest(authors) a WHERE LOWER(a) LIKE $1))"
        }
    };
    let pattern = like_pattern(query);

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books WHERE {}", condition))
        .bind(&pattern)
        .fetch_one(&mut *conn)
        .await?;

    let books = sqlx::query_as::<_, Book>(&format!(
        r#"
        SELECT {}
        FROM books
        WHERE {}
        ORDER BY created_at, id
        LIMIT $2 OFFSET $3
        "#,
        BOOK_COLUMNS, condition
    ))
    .bind(&pattern)
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(&mut *conn)
    .await?;

    Ok((books, total))
}

/// Create a new book
pub async fn create(conn: &mut PgConnection, book: &CreateBook) -> AppResult<Book> {
    let now = Utc::now();

    let created = sqlx::query_as::<_, Book>(&format!(
        r#"
        INSERT INTO books (id, title, authors, isbn, publisher, stock, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        RETURNING {}
        "#,
        BOOK_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&book.title)
    .bind(&book.authors)
    .bind(&book.isbn)
    .bind(&book.publisher)
    .bind(book.stock)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(created)
}

/// Update the provided fields of a book
pub async fn update(conn: &mut PgConnection, id: Uuid, book: &UpdateBook) -> AppResult<Book> {
    sqlx::query_as::<_, Book>(&format!(
        r#"
        UPDATE books SET
            title = COALESCE($2, title),
            authors = COALESCE($3, authors),
            isbn = COALESCE($4, isbn),
            publisher = COALESCE($5, publisher),
            stock = COALESCE($6, stock),
            updated_at = $7
        WHERE id = $1
        RETURNING {}
        "#,
        BOOK_COLUMNS
    ))
    .bind(id)
    .bind(&book.title)
    .bind(&book.authors)
    .bind(&book.isbn)
    .bind(&book.publisher)
    .bind(book.stock)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found(Entity::Book, id))
}

/// Conditionally add `delta` to the stock. The row lock taken by the UPDATE
/// serialises concurrent issues of the same book.
pub async fn update_stock(conn: &mut PgConnection, id: Uuid, delta: i32) -> AppResult<i32> {
    let stock: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE books SET stock = stock + $2, updated_at = $3
        WHERE id = $1 AND stock + $2 >= 0
        RETURNING stock
        "#,
    )
    .bind(id)
    .bind(delta)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    match stock {
        Some(stock) => Ok(stock),
        None => {
            // Distinguish a missing book from a refused decrement
            get_by_id(conn, id).await?;
            Err(AppError::Conflict(format!(
                "Stock of book {} cannot change by {}",
                id, delta
            )))
        }
    }
}

/// Delete a book; refused by the foreign key while transactions reference it
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM books WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(Entity::Book, id));
    }
    Ok(())
}
