//! Router tests running the full HTTP stack against the in-memory store

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use library_server::{
    api,
    config::AppConfig,
    models::{transaction::ReturnReceipt, Book, Member, OutstandingDebt, Transaction},
    repository::{CirculationStore, MemoryRepository},
    services::Services,
    AppState,
};

struct TestApp {
    router: Router,
    store: MemoryRepository,
}

impl TestApp {
    fn new() -> Self {
        let store = MemoryRepository::new();
        let config = AppConfig::default();
        let shared: Arc<dyn CirculationStore> = Arc::new(store.clone());
        let services = Services::new(shared, config.circulation.clone());
        let state = AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        };
        Self {
            router: api::create_router(state),
            store,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn book(&self, title: &str, author: &str, stock: i32) -> Book {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/books",
                Some(json!({
                    "title": title,
                    "authors": [author],
                    "isbn": format!("978{}", Uuid::new_v4().simple()),
                    "stock": stock
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_value(body).unwrap()
    }

    async fn member(&self) -> Member {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/members",
                Some(json!({
                    "name": "Scout Finch",
                    "email": format!("{}@example.org", Uuid::new_v4().simple()),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_value(body).unwrap()
    }

    /// Charge a member directly, as earlier returns would have
    async fn charge(&self, member_id: Uuid, amount: Decimal) {
        let mut session = self.store.begin().await.unwrap();
        session.update_member_debt(member_id, amount).await.unwrap();
        session.commit().await.unwrap();
    }

    async fn issue(&self, book_id: Uuid, member_id: Uuid, at: DateTime<Utc>) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/v1/transactions",
            Some(json!({
                "book_id": book_id,
                "member_id": member_id,
                "issue_date": at,
            })),
        )
        .await
    }
}

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send(Method::GET, "/api/v1/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_issue_and_return_charges_rent() {
    let app = TestApp::new();
    let book = app.book("To Kill a Mockingbird", "Harper Lee", 2).await;
    let member = app.member().await;

    let (status, body) = app.issue(book.id, member.id, date(2024, 5, 1)).await;
    assert_eq!(status, StatusCode::CREATED);
    let transaction: Transaction = serde_json::from_value(body).unwrap();
    assert!(transaction.is_open());

    let (_, body) = app
        .send(Method::GET, &format!("/api/v1/books/{}", book.id), None)
        .await;
    assert_eq!(body["stock"], 1);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/transactions/{}/return", transaction.id),
            Some(json!({ "return_date": date(2024, 5, 4) })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let receipt: ReturnReceipt = serde_json::from_value(body).unwrap();
    assert_eq!(receipt.days_rented, 3);
    assert_eq!(receipt.rent_fee, dec!(30));
    assert_eq!(receipt.member_debt, dec!(30));
    assert_eq!(receipt.transaction.rent_fee, Some(dec!(30)));

    let (_, body) = app
        .send(Method::GET, &format!("/api/v1/books/{}", book.id), None)
        .await;
    assert_eq!(body["stock"], 2);

    // A second return changes nothing
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/transactions/{}/return", transaction.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 13);

    let (_, body) = app
        .send(Method::GET, &format!("/api/v1/members/{}", member.id), None)
        .await;
    let member: Member = serde_json::from_value(body).unwrap();
    assert_eq!(member.debt, dec!(30));
}

#[tokio::test]
async fn test_out_of_stock_is_conflict() {
    let app = TestApp::new();
    let book = app.book("Go Set a Watchman", "Harper Lee", 0).await;
    let member = app.member().await;

    let (status, body) = app.issue(book.id, member.id, Utc::now()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 7);
    assert_eq!(body["error"], "BookOutOfStock");
}

#[tokio::test]
async fn test_debt_ceiling_refuses_issue() {
    let app = TestApp::new();
    let book = app.book("Dune", "Frank Herbert", 3).await;
    let member = app.member().await;
    app.charge(member.id, dec!(500)).await;

    let (status, body) = app.issue(book.id, member.id, Utc::now()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 11);

    let (_, body) = app
        .send(Method::GET, &format!("/api/v1/books/{}", book.id), None)
        .await;
    assert_eq!(body["stock"], 3);
}

#[tokio::test]
async fn test_open_loans_count_towards_debt() {
    let app = TestApp::new();
    let first = app.book("Dune", "Frank Herbert", 1).await;
    let second = app.book("Children of Dune", "Frank Herbert", 1).await;
    let member = app.member().await;
    app.charge(member.id, dec!(480)).await;

    let issued = Utc::now() - Duration::days(2);
    let (status, _) = app.issue(first.id, member.id, issued).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/members/{}/debt", member.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let debt: OutstandingDebt = serde_json::from_value(body).unwrap();
    assert_eq!(debt.charged, dec!(480));
    assert!(debt.accrued >= dec!(20));
    assert!(debt.at_ceiling());

    let (status, _) = app.issue(second.id, member.id, Utc::now()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_missing_records_are_not_found() {
    let app = TestApp::new();
    let book = app.book("Emma", "Jane Austen", 1).await;
    let member = app.member().await;

    let (status, body) = app.issue(Uuid::new_v4(), member.id, Utc::now()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 5);

    let (status, body) = app.issue(book.id, Uuid::new_v4(), Utc::now()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/transactions/{}/return", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 20);
}

#[tokio::test]
async fn test_search_books() {
    let app = TestApp::new();
    app.book("Pride and Prejudice", "Jane Austen", 1).await;
    app.book("Persuasion", "Jane Austen", 1).await;
    app.book("Dracula", "Bram Stoker", 1).await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/books/search?query=AUSTEN", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"][0]["title"], "Pride and Prejudice");
    assert_eq!(body["items"][1]["title"], "Persuasion");

    let (_, body) = app
        .send(
            Method::GET,
            "/api/v1/books/search?query=dra&field=title",
            None,
        )
        .await;
    assert_eq!(body["total"], 1);

    let (_, body) = app
        .send(
            Method::GET,
            "/api/v1/books/search?query=austen&field=title",
            None,
        )
        .await;
    assert_eq!(body["total"], 0);

    let (status, _) = app
        .send(Method::GET, "/api/v1/books/search?query=%20", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_book_is_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/books",
            Some(json!({ "title": "", "isbn": "978", "stock": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 18);
}

#[tokio::test]
async fn test_payment_reduces_debt() {
    let app = TestApp::new();
    let member = app.member().await;
    app.charge(member.id, dec!(120)).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/members/{}/payments", member.id),
            Some(json!({ "amount": "100" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let paid: Member = serde_json::from_value(body).unwrap();
    assert_eq!(paid.debt, dec!(20));

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/members/{}/payments", member.id),
            Some(json!({ "amount": "50" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transaction_listing_and_deletion() {
    let app = TestApp::new();
    let book = app.book("Middlemarch", "George Eliot", 1).await;
    let member = app.member().await;

    let (_, body) = app.issue(book.id, member.id, date(2024, 2, 1)).await;
    let transaction: Transaction = serde_json::from_value(body).unwrap();

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/transactions?member_id={}&status=issued", member.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    // Open transactions and referenced books stay
    let uri = format!("/api/v1/transactions/{}", transaction.id);
    let (status, _) = app.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .send(Method::DELETE, &format!("/api/v1/books/{}", book.id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.send(
        Method::POST,
        &format!("{}/return", uri),
        Some(json!({ "return_date": date(2024, 2, 2) })),
    )
    .await;

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/members/{}/transactions", member.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["status"], "returned");

    let (status, _) = app.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_huge_page_number_is_clamped() {
    let app = TestApp::new();
    app.book("Emma", "Jane Austen", 1).await;

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/books?page={}", i64::MAX),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["page"], i64::MAX / 100);

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/api/v1/books/search?query=emma&page={}", i64::MAX),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_return_body_is_rejected() {
    let app = TestApp::new();
    let book = app.book("Walden", "Henry David Thoreau", 1).await;
    let member = app.member().await;

    let (_, body) = app
        .issue(book.id, member.id, Utc::now() - Duration::days(10))
        .await;
    let transaction: Transaction = serde_json::from_value(body).unwrap();
    let uri = format!("/api/v1/transactions/{}/return", transaction.id);

    let (status, body) = app
        .send(Method::POST, &uri, Some(json!({ "return_date": "not-a-date" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 18);

    // Nothing was charged and the loan is still open
    let (_, body) = app
        .send(Method::GET, &format!("/api/v1/transactions/{}", transaction.id), None)
        .await;
    assert_eq!(body["status"], "issued");
    let (_, body) = app
        .send(Method::GET, &format!("/api/v1/members/{}", member.id), None)
        .await;
    let unchanged: Member = serde_json::from_value(body).unwrap();
    assert_eq!(unchanged.debt, Decimal::ZERO);

    // Without a body the book is returned now
    let (status, body) = app.send(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let receipt: ReturnReceipt = serde_json::from_value(body).unwrap();
    assert!(receipt.days_rented >= 10);
    assert_eq!(receipt.rent_fee, Decimal::from(receipt.days_rented * 10));
}
