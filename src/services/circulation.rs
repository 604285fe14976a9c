//! Circulation policy: issuing and returning books, rent fees and the
//! member debt ceiling.
//!
//! Every operation runs inside a single store session and commits once at the
//! end, so a failure at any step leaves the store untouched. The service keeps
//! no state between calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{
        transaction::ReturnReceipt, Member, OutstandingDebt, PageRequest, Transaction,
        TransactionFilter,
    },
    repository::{CirculationStore, StoreSession},
};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Rent and debt parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RentPolicy {
    pub daily_rate: Decimal,
    pub debt_ceiling: Decimal,
}

impl From<CirculationConfig> for RentPolicy {
    fn from(config: CirculationConfig) -> Self {
        Self {
            daily_rate: config.daily_rate,
            debt_ceiling: config.debt_ceiling,
        }
    }
}

impl Default for RentPolicy {
    fn default() -> Self {
        CirculationConfig::default().into()
    }
}

impl RentPolicy {
    /// Days charged for a loan: partial days round up, with a minimum of one day.
    pub fn days_rented(issue_date: DateTime<Utc>, return_date: DateTime<Utc>) -> AppResult<i64> {
        let elapsed = (return_date - issue_date).num_milliseconds();
        if elapsed < 0 {
            return Err(AppError::Validation(format!(
                "Return date {} is before issue date {}",
                return_date, issue_date
            )));
        }
        Ok(((elapsed + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY).max(1))
    }

    pub fn fee_for_days(&self, days: i64) -> Decimal {
        self.daily_rate * Decimal::from(days)
    }

    /// Rent fee for a loan returned at `return_date`
    pub fn rent_fee(
        &self,
        issue_date: DateTime<Utc>,
        return_date: DateTime<Utc>,
    ) -> AppResult<Decimal> {
        Ok(self.fee_for_days(Self::days_rented(issue_date, return_date)?))
    }

    /// Fee an open loan would incur if returned at `as_of` (at least one day)
    pub fn accrued_fee(&self, issue_date: DateTime<Utc>, as_of: DateTime<Utc>) -> Decimal {
        let as_of = as_of.max(issue_date);
        self.rent_fee(issue_date, as_of)
            .unwrap_or_else(|_| self.fee_for_days(1))
    }
}

#[derive(Clone)]
pub struct CirculationService {
    store: Arc<dyn CirculationStore>,
    policy: RentPolicy,
}

impl CirculationService {
    pub fn new(store: Arc<dyn CirculationStore>, policy: RentPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RentPolicy {
        &self.policy
    }

    /// Lend a copy of a book to a member
    pub async fn issue_book(
        &self,
        book_id: Uuid,
        member_id: Uuid,
        issue_date: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        let mut session = self.store.begin().await?;

        let book = session.get_book(book_id).await?;
        if book.stock <= 0 {
            return Err(AppError::OutOfStock { book_id });
        }

        let member = session.lock_member(member_id).await?;
        let debt = self
            .outstanding_debt(session.as_mut(), &member, issue_date)
            .await?;
        if debt.at_ceiling() {
            tracing::info!(
                "Issue refused: member {} owes {} (ceiling {})",
                member_id, debt.total, debt.ceiling
            );
            return Err(AppError::DebtLimitExceeded {
                member_id,
                debt: debt.total,
                ceiling: debt.ceiling,
            });
        }

        // The conditional decrement is the authoritative stock check
        session
            .update_book_stock(book_id, -1)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => AppError::OutOfStock { book_id },
                other => other,
            })?;

        let transaction = session
            .create_transaction(book_id, member_id, issue_date)
            .await?;
        session.commit().await?;

        tracing::info!(
            "Issued book {} to member {} (transaction {})",
            book_id, member_id, transaction.id
        );
        Ok(transaction)
    }

    /// Close an open transaction, charging the rent fee to the member
    pub async fn return_book(
        &self,
        transaction_id: Uuid,
        return_date: DateTime<Utc>,
    ) -> AppResult<ReturnReceipt> {
        let mut session = self.store.begin().await?;

        let transaction = session.get_transaction(transaction_id).await?;
        if !transaction.is_open() {
            return Err(AppError::AlreadyReturned { transaction_id });
        }

        let days_rented = RentPolicy::days_rented(transaction.issue_date, return_date)?;
        let rent_fee = self.policy.fee_for_days(days_rented);

        let closed = session
            .close_transaction(transaction_id, return_date, rent_fee)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => AppError::AlreadyReturned { transaction_id },
                other => other,
            })?;
        session.update_book_stock(transaction.book_id, 1).await?;
        let member_debt = session
            .update_member_debt(transaction.member_id, rent_fee)
            .await?;
        session.commit().await?;

        tracing::info!(
            "Returned transaction {} after {} day(s), fee {}",
            transaction_id, days_rented, rent_fee
        );
        Ok(ReturnReceipt {
            transaction: closed,
            days_rented,
            rent_fee,
            member_debt,
        })
    }

    /// Debt position of a member at `as_of`
    pub async fn compute_outstanding_debt(
        &self,
        member_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> AppResult<OutstandingDebt> {
        let mut session = self.store.begin().await?;
        let member = session.get_member(member_id).await?;
        self.outstanding_debt(session.as_mut(), &member, as_of).await
    }

    async fn outstanding_debt(
        &self,
        session: &mut dyn StoreSession,
        member: &Member,
        as_of: DateTime<Utc>,
    ) -> AppResult<OutstandingDebt> {
        let accrued = session
            .list_open_transactions(member.id)
            .await?
            .iter()
            .map(|t| self.policy.accrued_fee(t.issue_date, as_of))
            .sum::<Decimal>();

        Ok(OutstandingDebt {
            member_id: member.id,
            charged: member.debt,
            accrued,
            total: member.debt + accrued,
            ceiling: self.policy.debt_ceiling,
            as_of,
        })
    }

    /// List transactions
    pub async fn list_transactions(
        &self,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> AppResult<(Vec<Transaction>, i64)> {
        let mut session = self.store.begin().await?;
        session.list_transactions(filter, page).await
    }

    /// Get transaction by ID
    pub async fn get_transaction(&self, id: Uuid) -> AppResult<Transaction> {
        let mut session = self.store.begin().await?;
        session.get_transaction(id).await
    }

    /// Delete a closed transaction. Open ones still account for an issued copy.
    pub async fn delete_transaction(&self, id: Uuid) -> AppResult<()> {
        let mut session = self.store.begin().await?;
        let transaction = session.get_transaction(id).await?;
        if transaction.is_open() {
            return Err(AppError::Conflict(format!(
                "Transaction {} is still open; return the book first",
                id
            )));
        }
        session.delete_transaction(id).await?;
        session.commit().await
    }
}
