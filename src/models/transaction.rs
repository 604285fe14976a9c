//! Loan transaction model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Transaction lifecycle: `Issued` (open) moves once to `Returned` (closed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Issued,
    Returned,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Issued => "issued",
            TransactionStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "issued" => Ok(TransactionStatus::Issued),
            "returned" => Ok(TransactionStatus::Returned),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

// SQLx conversion for TransactionStatus (stored as TEXT)
impl sqlx::Type<Postgres> for TransactionStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for TransactionStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for TransactionStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Transaction model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub status: TransactionStatus,
    pub issue_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub rent_fee: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_open(&self) -> bool {
        self.status == TransactionStatus::Issued
    }
}

/// Issue (borrow) request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IssueBook {
    pub book_id: Uuid,
    pub member_id: Uuid,
    /// Defaults to the current time
    pub issue_date: Option<DateTime<Utc>>,
}

/// Return request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReturnBook {
    /// Defaults to the current time
    pub return_date: Option<DateTime<Utc>>,
}

/// Outcome of a return: the closed transaction and the charge it produced
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReturnReceipt {
    pub transaction: Transaction,
    pub days_rented: i64,
    pub rent_fee: Decimal,
    /// Member's charged debt after the fee was added
    pub member_debt: Decimal,
}

/// Filters applied when listing transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub member_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
}

impl TransactionFilter {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.member_id.map_or(true, |id| transaction.member_id == id)
            && self.book_id.map_or(true, |id| transaction.book_id == id)
            && self.status.map_or(true, |s| transaction.status == s)
    }
}

/// Transaction list query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct TransactionQuery {
    pub member_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl TransactionQuery {
    pub fn filter(&self) -> TransactionFilter {
        TransactionFilter {
            member_id: self.member_id,
            book_id: self.book_id,
            status: self.status,
        }
    }
}
