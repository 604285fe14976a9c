//! Store layer: the unit-of-work interface the services depend on, and its
//! PostgreSQL and in-memory implementations.

pub mod books;
pub mod members;
pub mod memory;
pub mod transactions;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        Book, CreateBook, CreateMember, Member, PageRequest, SearchField, Transaction,
        TransactionFilter, UpdateBook, UpdateMember,
    },
};

pub use memory::MemoryRepository;

/// Entry point to a store: opens units of work.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CirculationStore: Send + Sync {
    /// Start a unit of work. Nothing it writes is visible until `commit`;
    /// dropping it uncommitted discards every change.
    async fn begin(&self) -> AppResult<Box<dyn StoreSession>>;

    /// Check the store is reachable
    async fn ping(&self) -> AppResult<()>;
}

/// One unit of work against the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreSession: Send {
    async fn get_book(&mut self, id: Uuid) -> AppResult<Book>;
    async fn list_books(&mut self, page: PageRequest) -> AppResult<(Vec<Book>, i64)>;
    /// Case-insensitive substring search, oldest first, ties by id
    async fn search_books(
        &mut self,
        query: &str,
        field: Option<SearchField>,
        page: PageRequest,
    ) -> AppResult<(Vec<Book>, i64)>;
    async fn create_book(&mut self, book: &CreateBook) -> AppResult<Book>;
    async fn update_book(&mut self, id: Uuid, book: &UpdateBook) -> AppResult<Book>;
    /// Add `delta` to the stock, failing with `Conflict` if the result would be negative
    async fn update_book_stock(&mut self, id: Uuid, delta: i32) -> AppResult<i32>;
    async fn delete_book(&mut self, id: Uuid) -> AppResult<()>;

    async fn get_member(&mut self, id: Uuid) -> AppResult<Member>;
    /// Read a member and hold its row until the session ends, so debt checks
    /// of concurrent sessions on the same member run one after the other
    async fn lock_member(&mut self, id: Uuid) -> AppResult<Member>;
    async fn list_members(&mut self, page: PageRequest) -> AppResult<(Vec<Member>, i64)>;
    async fn create_member(&mut self, member: &CreateMember) -> AppResult<Member>;
    async fn update_member(&mut self, id: Uuid, member: &UpdateMember) -> AppResult<Member>;
    /// Add `delta` to the debt, failing with `Conflict` if the result would be negative
    async fn update_member_debt(&mut self, id: Uuid, delta: Decimal) -> AppResult<Decimal>;
    async fn delete_member(&mut self, id: Uuid) -> AppResult<()>;

    async fn create_transaction(
        &mut self,
        book_id: Uuid,
        member_id: Uuid,
        issue_date: DateTime<Utc>,
    ) -> AppResult<Transaction>;
    async fn get_transaction(&mut self, id: Uuid) -> AppResult<Transaction>;
    async fn list_transactions(
        &mut self,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> AppResult<(Vec<Transaction>, i64)>;
    /// Open transactions of a member, oldest first
    async fn list_open_transactions(&mut self, member_id: Uuid) -> AppResult<Vec<Transaction>>;
    /// Close an open transaction, failing with `Conflict` if it is already closed
    async fn close_transaction(
        &mut self,
        id: Uuid,
        return_date: DateTime<Utc>,
        rent_fee: Decimal,
    ) -> AppResult<Transaction>;
    async fn delete_transaction(&mut self, id: Uuid) -> AppResult<()>;

    async fn commit(&mut self) -> AppResult<()>;
}

/// PostgreSQL-backed store holding the connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CirculationStore for Repository {
    async fn begin(&self) -> AppResult<Box<dyn StoreSession>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx: Some(tx) }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A database transaction; rolled back by sqlx when dropped uncommitted
pub struct PgSession {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PgSession {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Session used after commit".to_string()))
    }
}

#[async_trait]
impl StoreSession for PgSession {
    async fn get_book(&mut self, id: Uuid) -> AppResult<Book> {
        books::get_by_id(self.conn()?, id).await
    }

    async fn list_books(&mut self, page: PageRequest) -> AppResult<(Vec<Book>, i64)> {
        books::list(self.conn()?, page).await
    }

    async fn search_books(
        &mut self,
        query: &str,
        field: Option<SearchField>,
        page: PageRequest,
    ) -> AppResult<(Vec<Book>, i64)> {
        books::search(self.conn()?, query, field, page).await
    }

    async fn create_book(&mut self, book: &CreateBook) -> AppResult<Book> {
        books::create(self.conn()?, book).await
    }

    async fn update_book(&mut self, id: Uuid, book: &UpdateBook) -> AppResult<Book> {
        books::update(self.conn()?, id, book).await
    }

    async fn update_book_stock(&mut self, id: Uuid, delta: i32) -> AppResult<i32> {
        books::update_stock(self.conn()?, id, delta).await
    }

    async fn delete_book(&mut self, id: Uuid) -> AppResult<()> {
        books::delete(self.conn()?, id).await
    }

    async fn get_member(&mut self, id: Uuid) -> AppResult<Member> {
        members::get_by_id(self.conn()?, id).await
    }

    async fn lock_member(&mut self, id: Uuid) -> AppResult<Member> {
        members::get_for_update(self.conn()?, id).await
    }

    async fn list_members(&mut self, page: PageRequest) -> AppResult<(Vec<Member>, i64)> {
        members::list(self.conn()?, page).await
    }

    async fn create_member(&mut self, member: &CreateMember) -> AppResult<Member> {
        members::create(self.conn()?, member).await
    }

    async fn update_member(&mut self, id: Uuid, member: &UpdateMember) -> AppResult<Member> {
        members::update(self.conn()?, id, member).await
    }

    async fn update_member_debt(&mut self, id: Uuid, delta: Decimal) -> AppResult<Decimal> {
        members::update_debt(self.conn()?, id, delta).await
    }

    async fn delete_member(&mut self, id: Uuid) -> AppResult<()> {
        members::delete(self.conn()?, id).await
    }

    async fn create_transaction(
        &mut self,
        book_id: Uuid,
        member_id: Uuid,
        issue_date: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        transactions::create(self.conn()?, book_id, member_id, issue_date).await
    }

    async fn get_transaction(&mut self, id: Uuid) -> AppResult<Transaction> {
        transactions::get_by_id(self.conn()?, id).await
    }

    async fn list_transactions(
        &mut self,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> AppResult<(Vec<Transaction>, i64)> {
        transactions::list(self.conn()?, filter, page).await
    }

    async fn list_open_transactions(&mut self, member_id: Uuid) -> AppResult<Vec<Transaction>> {
        transactions::list_open_for_member(self.conn()?, member_id).await
    }

    async fn close_transaction(
        &mut self,
        id: Uuid,
        return_date: DateTime<Utc>,
        rent_fee: Decimal,
    ) -> AppResult<Transaction> {
        transactions::close(self.conn()?, id, return_date, rent_fee).await
    }

    async fn delete_transaction(&mut self, id: Uuid) -> AppResult<()> {
        transactions::delete(self.conn()?, id).await
    }

    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Internal("Session already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }
}

/// Escape LIKE wildcards so user input only ever matches literally
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
