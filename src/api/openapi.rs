//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, members, transactions};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Circulation API",
        version = "1.0.0",
        description = "Book lending, rent fees and member debt"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::search_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Members
        members::list_members,
        members::get_member,
        members::create_member,
        members::update_member,
        members::delete_member,
        members::get_member_debt,
        members::record_payment,
        members::get_member_transactions,
        // Transactions
        transactions::list_transactions,
        transactions::get_transaction,
        transactions::issue_book,
        transactions::return_book,
        transactions::delete_transaction,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::SearchField,
            // Members
            crate::models::member::Member,
            crate::models::member::CreateMember,
            crate::models::member::UpdateMember,
            crate::models::member::MemberPayment,
            crate::models::member::OutstandingDebt,
            // Transactions
            crate::models::transaction::Transaction,
            crate::models::transaction::TransactionStatus,
            crate::models::transaction::IssueBook,
            crate::models::transaction::ReturnBook,
            crate::models::transaction::ReturnReceipt,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog management and search"),
        (name = "members", description = "Members, payments and debt"),
        (name = "transactions", description = "Issuing and returning books")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
