//! Member management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        member::{MemberPayment, MemberQuery},
        CreateMember, Member, OutstandingDebt, PageRequest, Transaction, UpdateMember,
    },
};

use super::books::PaginatedResponse;

#[derive(Deserialize, IntoParams)]
pub struct DebtParams {
    /// Point in time to value open loans at (default: now)
    pub as_of: Option<DateTime<Utc>>,
}

/// List members with pagination
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    params(
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Members per page")
    ),
    responses(
        (status = 200, description = "List of members", body = PaginatedResponse<Member>)
    )
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<PaginatedResponse<Member>>> {
    let (members, total) = state.services.members.list_members(&query).await?;

    Ok(Json(PaginatedResponse::new(
        members,
        total,
        PageRequest::new(query.page, query.per_page),
    )))
}

/// Get member details by ID
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.get_member(id).await?;
    Ok(Json(member))
}

/// Create a new member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = Member),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_member(
    State(state): State<crate::AppState>,
    Json(member): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<Member>)> {
    let created = state.services.members.create_member(member).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an existing member
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 404, description = "Member not found"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_member(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(member): Json<UpdateMember>,
) -> AppResult<Json<Member>> {
    let updated = state.services.members.update_member(id, member).await?;
    Ok(Json(updated))
}

/// Delete a member
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 404, description = "Member not found"),
        (status = 409, description = "Member is referenced by transactions")
    )
)]
pub async fn delete_member(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.members.delete_member(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Outstanding debt of a member, including fees accruing on open loans
#[utoipa::path(
    get,
    path = "/members/{id}/debt",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID"),
        DebtParams
    ),
    responses(
        (status = 200, description = "Debt position", body = OutstandingDebt),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member_debt(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DebtParams>,
) -> AppResult<Json<OutstandingDebt>> {
    let as_of = params.as_of.unwrap_or_else(Utc::now);
    let debt = state
        .services
        .circulation
        .compute_outstanding_debt(id, as_of)
        .await?;
    Ok(Json(debt))
}

/// Record a payment against a member's debt
#[utoipa::path(
    post,
    path = "/members/{id}/payments",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    request_body = MemberPayment,
    responses(
        (status = 200, description = "Payment recorded", body = Member),
        (status = 400, description = "Amount not positive or above the debt"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn record_payment(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(payment): Json<MemberPayment>,
) -> AppResult<Json<Member>> {
    let member = state
        .services
        .members
        .record_payment(id, payment.amount)
        .await?;
    Ok(Json(member))
}

/// Transactions of a member
#[utoipa::path(
    get,
    path = "/members/{id}/transactions",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID"),
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Transactions per page")
    ),
    responses(
        (status = 200, description = "Member's transactions", body = PaginatedResponse<Transaction>),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member_transactions(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<PaginatedResponse<Transaction>>> {
    let page = PageRequest::new(query.page, query.per_page);
    let (transactions, total) = state
        .services
        .members
        .list_member_transactions(id, page)
        .await?;
    Ok(Json(PaginatedResponse::new(transactions, total, page)))
}
