//! Loan transaction endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        transaction::{IssueBook, ReturnBook, ReturnReceipt, TransactionQuery},
        PageRequest, Transaction,
    },
};

use super::books::PaginatedResponse;

/// List transactions
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "transactions",
    params(
        ("member_id" = Option<Uuid>, Query, description = "Filter by member"),
        ("book_id" = Option<Uuid>, Query, description = "Filter by book"),
        ("status" = Option<String>, Query, description = "issued or returned"),
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Transactions per page")
    ),
    responses(
        (status = 200, description = "List of transactions", body = PaginatedResponse<Transaction>)
    )
)]
pub async fn list_transactions(
    State(state): State<crate::AppState>,
    Query(query): Query<TransactionQuery>,
) -> AppResult<Json<PaginatedResponse<Transaction>>> {
    let page = PageRequest::new(query.page, query.per_page);
    let (transactions, total) = state
        .services
        .circulation
        .list_transactions(query.filter(), page)
        .await?;
    Ok(Json(PaginatedResponse::new(transactions, total, page)))
}

/// Get transaction details by ID
#[utoipa::path(
    get,
    path = "/transactions/{id}",
    tag = "transactions",
    params(
        ("id" = Uuid, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Transaction details", body = Transaction),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn get_transaction(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Transaction>> {
    let transaction = state.services.circulation.get_transaction(id).await?;
    Ok(Json(transaction))
}

/// Issue a book to a member
#[utoipa::path(
    post,
    path = "/transactions",
    tag = "transactions",
    request_body = IssueBook,
    responses(
        (status = 201, description = "Book issued", body = Transaction),
        (status = 404, description = "Book or member not found"),
        (status = 409, description = "Book out of stock"),
        (status = 422, description = "Member debt at or above the ceiling")
    )
)]
pub async fn issue_book(
    State(state): State<crate::AppState>,
    Json(request): Json<IssueBook>,
) -> AppResult<(StatusCode, Json<Transaction>)> {
    let issue_date = request.issue_date.unwrap_or_else(Utc::now);
    let transaction = state
        .services
        .circulation
        .issue_book(request.book_id, request.member_id, issue_date)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/transactions/{id}/return",
    tag = "transactions",
    params(
        ("id" = Uuid, Path, description = "Transaction ID")
    ),
    request_body(content = ReturnBook, description = "Optional return date", content_type = "application/json"),
    responses(
        (status = 200, description = "Book returned and rent charged", body = ReturnReceipt),
        (status = 400, description = "Malformed body or return date before issue date"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    request: Result<Json<ReturnBook>, JsonRejection>,
) -> AppResult<Json<ReturnReceipt>> {
    // A bodiless request returns now; a body that fails to parse is an error
    let request = match request {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => ReturnBook::default(),
        Err(rejection) => return Err(AppError::BadRequest(rejection.body_text())),
    };
    let return_date = request.return_date.unwrap_or_else(Utc::now);
    let receipt = state.services.circulation.return_book(id, return_date).await?;
    Ok(Json(receipt))
}

/// Delete a returned transaction
#[utoipa::path(
    delete,
    path = "/transactions/{id}",
    tag = "transactions",
    params(
        ("id" = Uuid, Path, description = "Transaction ID")
    ),
    responses(
        (status = 204, description = "Transaction deleted"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Transaction still open")
    )
)]
pub async fn delete_transaction(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.circulation.delete_transaction(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
