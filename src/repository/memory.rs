//! In-memory store, used for tests and local runs without PostgreSQL.
//!
//! A session holds the store lock for its whole lifetime, so units of work
//! are fully serialised. Changes are made on a copy of the state that only
//! replaces the shared state on commit.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{CirculationStore, StoreSession};
use crate::{
    error::{AppError, AppResult, Entity},
    models::{
        Book, CreateBook, CreateMember, Member, PageRequest, SearchField, Transaction,
        TransactionFilter, TransactionStatus, UpdateBook, UpdateMember,
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: IndexMap<Uuid, Book>,
    members: IndexMap<Uuid, Member>,
    transactions: IndexMap<Uuid, Transaction>,
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CirculationStore for MemoryRepository {
    async fn begin(&self) -> AppResult<Box<dyn StoreSession>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemorySession { guard, working }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemorySession {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn paginate<T>(rows: Vec<T>, page: PageRequest) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.per_page as usize)
        .collect();
    (items, total)
}

fn sorted_books<'a>(books: impl Iterator<Item = &'a Book>) -> Vec<Book> {
    let mut books: Vec<Book> = books.cloned().collect();
    books.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    books
}

impl MemorySession {
    fn book_mut(&mut self, id: Uuid) -> AppResult<&mut Book> {
        self.working
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(Entity::Book, id))
    }

    fn member_mut(&mut self, id: Uuid) -> AppResult<&mut Member> {
        self.working
            .members
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(Entity::Member, id))
    }

    /// Emails are unique ignoring case, matching the `LOWER(email)` index
    fn email_taken(&self, email: &str, exclude: Option<Uuid>) -> bool {
        let email = email.to_lowercase();
        self.working
            .members
            .values()
            .any(|m| m.email.to_lowercase() == email && Some(m.id) != exclude)
    }

    fn referenced(&self, pred: impl Fn(&Transaction) -> bool) -> bool {
        self.working.transactions.values().any(pred)
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn get_book(&mut self, id: Uuid) -> AppResult<Book> {
        self.book_mut(id).map(|b| b.clone())
    }

    async fn list_books(&mut self, page: PageRequest) -> AppResult<(Vec<Book>, i64)> {
        Ok(paginate(sorted_books(self.working.books.values()), page))
    }

    async fn search_books(
        &mut self,
        query: &str,
        field: Option<SearchField>,
        page: PageRequest,
    ) -> AppResult<(Vec<Book>, i64)> {
        let needle = query.to_lowercase();
        let matching = self
            .working
            .books
            .values()
            .filter(|b| b.matches(&needle, field));
        Ok(paginate(sorted_books(matching), page))
    }

    async fn create_book(&mut self, book: &CreateBook) -> AppResult<Book> {
        let now = Utc::now();
        let created = Book {
            id: Uuid::new_v4(),
            title: book.title.clone(),
            authors: book.authors.clone(),
            isbn: book.isbn.clone(),
            publisher: book.publisher.clone(),
            stock: book.stock,
            created_at: now,
            updated_at: now,
        };
        self.working.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_book(&mut self, id: Uuid, update: &UpdateBook) -> AppResult<Book> {
        let book = self.book_mut(id)?;
        if let Some(ref title) = update.title {
            book.title = title.clone();
        }
        if let Some(ref authors) = update.authors {
            book.authors = authors.clone();
        }
        if let Some(ref isbn) = update.isbn {
            book.isbn = isbn.clone();
        }
        if let Some(ref publisher) = update.publisher {
            book.publisher = Some(publisher.clone());
        }
        if let Some(stock) = update.stock {
            book.stock = stock;
        }
        book.updated_at = Utc::now();
        Ok(book.clone())
    }

    async fn update_book_stock(&mut self, id: Uuid, delta: i32) -> AppResult<i32> {
        let book = self.book_mut(id)?;
        let stock = book.stock + delta;
        if stock < 0 {
            return Err(AppError::Conflict(format!(
                "Stock of book {} cannot change by {}",
                id, delta
            )));
        }
        book.stock = stock;
        book.updated_at = Utc::now();
        Ok(stock)
    }

    async fn delete_book(&mut self, id: Uuid) -> AppResult<()> {
        self.book_mut(id)?;
        if self.referenced(|t| t.book_id == id) {
            return Err(AppError::Conflict(
                "Record is still referenced by transactions".to_string(),
            ));
        }
        self.working.books.shift_remove(&id);
        Ok(())
    }

    async fn get_member(&mut self, id: Uuid) -> AppResult<Member> {
        self.member_mut(id).map(|m| m.clone())
    }

    async fn lock_member(&mut self, id: Uuid) -> AppResult<Member> {
        // The session already holds the store lock
        self.get_member(id).await
    }

    async fn list_members(&mut self, page: PageRequest) -> AppResult<(Vec<Member>, i64)> {
        let mut members: Vec<Member> = self.working.members.values().cloned().collect();
        members.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(paginate(members, page))
    }

    async fn create_member(&mut self, member: &CreateMember) -> AppResult<Member> {
        if self.email_taken(&member.email, None) {
            return Err(AppError::Conflict(format!("Duplicate value: {}", member.email)));
        }
        let now = Utc::now();
        let created = Member {
            id: Uuid::new_v4(),
            name: member.name.clone(),
            email: member.email.clone(),
            address: member.address.clone(),
            debt: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        self.working.members.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_member(&mut self, id: Uuid, update: &UpdateMember) -> AppResult<Member> {
        self.member_mut(id)?;
        if let Some(ref email) = update.email {
            if self.email_taken(email, Some(id)) {
                return Err(AppError::Conflict(format!("Duplicate value: {}", email)));
            }
        }
        let member = self.member_mut(id)?;
        if let Some(ref name) = update.name {
            member.name = name.clone();
        }
        if let Some(ref email) = update.email {
            member.email = email.clone();
        }
        if let Some(ref address) = update.address {
            member.address = Some(address.clone());
        }
        member.updated_at = Utc::now();
        Ok(member.clone())
    }

    async fn update_member_debt(&mut self, id: Uuid, delta: Decimal) -> AppResult<Decimal> {
        let member = self.member_mut(id)?;
        let debt = member.debt + delta;
        if debt < Decimal::ZERO {
            return Err(AppError::Conflict(format!(
                "Debt of member {} cannot change by {}",
                id, delta
            )));
        }
        member.debt = debt;
        member.updated_at = Utc::now();
        Ok(debt)
    }

    async fn delete_member(&mut self, id: Uuid) -> AppResult<()> {
        self.member_mut(id)?;
        if self.referenced(|t| t.member_id == id) {
            return Err(AppError::Conflict(
                "Record is still referenced by transactions".to_string(),
            ));
        }
        self.working.members.shift_remove(&id);
        Ok(())
    }

    async fn create_transaction(
        &mut self,
        book_id: Uuid,
        member_id: Uuid,
        issue_date: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        self.book_mut(book_id)?;
        self.member_mut(member_id)?;
        let created = Transaction {
            id: Uuid::new_v4(),
            book_id,
            member_id,
            status: TransactionStatus::Issued,
            issue_date,
            return_date: None,
            rent_fee: None,
            created_at: Utc::now(),
        };
        self.working.transactions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_transaction(&mut self, id: Uuid) -> AppResult<Transaction> {
        self.working
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(Entity::Transaction, id))
    }

    async fn list_transactions(
        &mut self,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> AppResult<(Vec<Transaction>, i64)> {
        let mut transactions: Vec<Transaction> = self
            .working
            .transactions
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.issue_date.cmp(&a.issue_date).then(a.id.cmp(&b.id)));
        Ok(paginate(transactions, page))
    }

    async fn list_open_transactions(&mut self, member_id: Uuid) -> AppResult<Vec<Transaction>> {
        let mut open: Vec<Transaction> = self
            .working
            .transactions
            .values()
            .filter(|t| t.member_id == member_id && t.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| (a.issue_date, a.id).cmp(&(b.issue_date, b.id)));
        Ok(open)
    }

    async fn close_transaction(
        &mut self,
        id: Uuid,
        return_date: DateTime<Utc>,
        rent_fee: Decimal,
    ) -> AppResult<Transaction> {
        let transaction = self
            .working
            .transactions
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(Entity::Transaction, id))?;
        if !transaction.is_open() {
            return Err(AppError::Conflict(format!("Transaction {} is already closed", id)));
        }
        transaction.status = TransactionStatus::Returned;
        transaction.return_date = Some(return_date);
        transaction.rent_fee = Some(rent_fee);
        Ok(transaction.clone())
    }

    async fn delete_transaction(&mut self, id: Uuid) -> AppResult<()> {
        self.working
            .transactions
            .shift_remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(Entity::Transaction, id))
    }

    async fn commit(&mut self) -> AppResult<()> {
        *self.guard = self.working.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_book(stock: i32) -> CreateBook {
        CreateBook {
            title: "Dune".to_string(),
            authors: vec!["Frank Herbert".to_string()],
            isbn: "9780441172719".to_string(),
            publisher: None,
            stock,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_session_is_discarded() {
        let store = MemoryRepository::new();

        let mut session = store.begin().await.unwrap();
        session.create_book(&new_book(1)).await.unwrap();
        drop(session);

        let mut session = store.begin().await.unwrap();
        let (books, total) = session.list_books(PageRequest::default()).await.unwrap();
        assert!(books.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_stock_never_goes_negative() {
        let store = MemoryRepository::new();
        let mut session = store.begin().await.unwrap();
        let book = session.create_book(&new_book(1)).await.unwrap();

        assert_eq!(session.update_book_stock(book.id, -1).await.unwrap(), 0);
        let err = session.update_book_stock(book.id, -1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(session.get_book(book.id).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_close_is_one_shot() {
        let store = MemoryRepository::new();
        let mut session = store.begin().await.unwrap();
        let book = session.create_book(&new_book(1)).await.unwrap();
        let member = session
            .create_member(&CreateMember {
                name: "Scout Finch".to_string(),
                email: "scout@example.org".to_string(),
                address: None,
            })
            .await
            .unwrap();
        let t = session
            .create_transaction(book.id, member.id, Utc::now())
            .await
            .unwrap();

        let closed = session
            .close_transaction(t.id, Utc::now(), Decimal::from(10))
            .await
            .unwrap();
        assert_eq!(closed.status, TransactionStatus::Returned);

        let err = session
            .close_transaction(t.id, Utc::now(), Decimal::from(20))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(
            session.get_transaction(t.id).await.unwrap().rent_fee,
            Some(Decimal::from(10))
        );
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryRepository::new();
        let mut session = store.begin().await.unwrap();
        let request = CreateMember {
            name: "Atticus".to_string(),
            email: "atticus@example.org".to_string(),
            address: None,
        };
        let atticus = session.create_member(&request).await.unwrap();
        let err = session.create_member(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let shouted = CreateMember {
            email: "Atticus@Example.org".to_string(),
            ..request.clone()
        };
        let err = session.create_member(&shouted).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Changing the case of one's own address is not a clash
        let update = UpdateMember {
            email: Some(shouted.email.clone()),
            ..Default::default()
        };
        let updated = session.update_member(atticus.id, &update).await.unwrap();
        assert_eq!(updated.email, "Atticus@Example.org");
    }
}
