//! Data models for the library server

pub mod book;
pub mod member;
pub mod pagination;
pub mod transaction;

// Re-export commonly used types
pub use book::{Book, CreateBook, SearchField, UpdateBook};
pub use member::{CreateMember, Member, OutstandingDebt, UpdateMember};
pub use pagination::PageRequest;
pub use transaction::{Transaction, TransactionFilter, TransactionStatus};
