//! Member management service

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        member::MemberQuery, CreateMember, Member, PageRequest, Transaction, TransactionFilter,
        UpdateMember,
    },
    repository::CirculationStore,
};

#[derive(Clone)]
pub struct MembersService {
    store: Arc<dyn CirculationStore>,
}

impl MembersService {
    pub fn new(store: Arc<dyn CirculationStore>) -> Self {
        Self { store }
    }

    /// List members with pagination
    pub async fn list_members(&self, query: &MemberQuery) -> AppResult<(Vec<Member>, i64)> {
        let mut session = self.store.begin().await?;
        session
            .list_members(PageRequest::new(query.page, query.per_page))
            .await
    }

    /// Get member by ID
    pub async fn get_member(&self, id: Uuid) -> AppResult<Member> {
        let mut session = self.store.begin().await?;
        session.get_member(id).await
    }

    /// Create a new member
    pub async fn create_member(&self, member: CreateMember) -> AppResult<Member> {
        member.validate()?;

        let mut session = self.store.begin().await?;
        let created = session.create_member(&member).await?;
        session.commit().await?;
        Ok(created)
    }

    /// Update an existing member
    pub async fn update_member(&self, id: Uuid, member: UpdateMember) -> AppResult<Member> {
        member.validate()?;

        let mut session = self.store.begin().await?;
        let updated = session.update_member(id, &member).await?;
        session.commit().await?;
        Ok(updated)
    }

    /// Delete a member that no transaction references
    pub async fn delete_member(&self, id: Uuid) -> AppResult<()> {
        let mut session = self.store.begin().await?;
        session.delete_member(id).await?;
        session.commit().await
    }

    /// Record a payment, reducing the member's charged debt
    pub async fn record_payment(&self, id: Uuid, amount: Decimal) -> AppResult<Member> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("Payment amount must be positive".to_string()));
        }

        let mut session = self.store.begin().await?;
        let member = session.get_member(id).await?;
        session
            .update_member_debt(id, -amount)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => AppError::Validation(format!(
                    "Payment of {} exceeds the debt of {} owed by member {}",
                    amount, member.debt, id
                )),
                other => other,
            })?;
        let updated = session.get_member(id).await?;
        session.commit().await?;

        tracing::info!("Payment of {} recorded for member {}", amount, id);
        Ok(updated)
    }

    /// Transactions of one member, most recent first
    pub async fn list_member_transactions(
        &self,
        id: Uuid,
        page: PageRequest,
    ) -> AppResult<(Vec<Transaction>, i64)> {
        let mut session = self.store.begin().await?;
        session.get_member(id).await?;
        let filter = TransactionFilter {
            member_id: Some(id),
            ..Default::default()
        };
        session.list_transactions(filter, page).await
    }
}
