//! Library member model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Member model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    /// Rent fees charged on return and not yet paid
    pub debt: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub address: Option<String>,
}

/// Update member request. Debt is not editable here; it only moves through
/// returns and payments.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Payment against a member's debt
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MemberPayment {
    pub amount: Decimal,
}

/// Member list query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct MemberQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Debt position of a member at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OutstandingDebt {
    pub member_id: Uuid,
    /// Fees charged on returned loans, net of payments
    pub charged: Decimal,
    /// Fees open loans would incur if returned at `as_of`
    pub accrued: Decimal,
    pub total: Decimal,
    pub ceiling: Decimal,
    pub as_of: DateTime<Utc>,
}

impl OutstandingDebt {
    /// Whether new loans must be refused
    pub fn at_ceiling(&self) -> bool {
        self.total >= self.ceiling
    }
}
