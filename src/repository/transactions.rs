//! Loan transaction queries

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, Entity},
    models::{PageRequest, Transaction, TransactionFilter, TransactionStatus},
};

const TRANSACTION_COLUMNS: &str =
    "id, book_id, member_id, status, issue_date, return_date, rent_fee, created_at";

/// Get transaction by ID
pub async fn get_by_id(conn: &mut PgConnection, id: Uuid) -> AppResult<Transaction> {
    sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {} FROM transactions WHERE id = $1",
        TRANSACTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found(Entity::Transaction, id))
}

/// List transactions matching the filter, most recent issue first
pub async fn list(
    conn: &mut PgConnection,
    filter: TransactionFilter,
    page: PageRequest,
) -> AppResult<(Vec<Transaction>, i64)> {
    let where_clause = r#"
        ($1::uuid IS NULL OR member_id = $1)
        AND ($2::uuid IS NULL OR book_id = $2)
        AND ($3::text IS NULL OR status = $3)
    "#;

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM transactions WHERE {}",
        where_clause
    ))
    .bind(filter.member_id)
    .bind(filter.book_id)
    .bind(filter.status)
    .fetch_one(&mut *conn)
    .await?;

    let transactions = sqlx::query_as::<_, Transaction>(&format!(
        r#"
        SELECT {}
        FROM transactions
        WHERE {}
        ORDER BY issue_date DESC, id
        LIMIT $4 OFFSET $5
        "#,
        TRANSACTION_COLUMNS, where_clause
    ))
    .bind(filter.member_id)
    .bind(filter.book_id)
    .bind(filter.status)
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(&mut *conn)
    .await?;

    Ok((transactions, total))
}

/// Open transactions of a member, oldest first
pub async fn list_open_for_member(
    conn: &mut PgConnection,
    member_id: Uuid,
) -> AppResult<Vec<Transaction>> {
    let transactions = sqlx::query_as::<_, Transaction>(&format!(
        r#"
        SELECT {}
        FROM transactions
        WHERE member_id = $1 AND status = $2
        ORDER BY issue_date, id
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(member_id)
    .bind(TransactionStatus::Issued)
    .fetch_all(&mut *conn)
    .await?;

    Ok(transactions)
}

/// Create an open transaction
pub async fn create(
    conn: &mut PgConnection,
    book_id: Uuid,
    member_id: Uuid,
    issue_date: DateTime<Utc>,
) -> AppResult<Transaction> {
    let created = sqlx::query_as::<_, Transaction>(&format!(
        r#"
        INSERT INTO transactions (id, book_id, member_id, status, issue_date, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(book_id)
    .bind(member_id)
    .bind(TransactionStatus::Issued)
    .bind(issue_date)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(created)
}

/// Close a transaction if it is still open
pub async fn close(
    conn: &mut PgConnection,
    id: Uuid,
    return_date: DateTime<Utc>,
    rent_fee: Decimal,
) -> AppResult<Transaction> {
    let closed = sqlx::query_as::<_, Transaction>(&format!(
        r#"
        UPDATE transactions SET status = $2, return_date = $3, rent_fee = $4
        WHERE id = $1 AND status = $5
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(id)
    .bind(TransactionStatus::Returned)
    .bind(return_date)
    .bind(rent_fee)
    .bind(TransactionStatus::Issued)
    .fetch_optional(&mut *conn)
    .await?;

    match closed {
        Some(transaction) => Ok(transaction),
        None => {
            get_by_id(conn, id).await?;
            Err(AppError::Conflict(format!("Transaction {} is already closed", id)))
        }
    }
}

/// Delete a transaction
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(Entity::Transaction, id));
    }
    Ok(())
}
