use std::sync::Arc;

use adapter::{push::DisabledPushSender, repository::memory::InMemoryStore};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use kernel::model::id::{BookId, UserId};
use registry::AppRegistry;
use rstest::rstest;
use serde_json::{json, Value};
use shared::config::NotificationConfig;
use tower::ServiceExt;

use super::routes;

struct TestApp {
    router: Router,
    owner: UserId,
    borrower: UserId,
    book_id: BookId,
}

async fn app(page_limit: i64) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let owner = store.add_user("Alice", None).await;
    let borrower = store.add_user("Bob", Some("https://example.com/bob.png")).await;
    let book_id = store.add_book(owner, "Rust in Action").await;
    let (registry, _worker) = AppRegistry::in_memory(
        store,
        Arc::new(DisabledPushSender),
        NotificationConfig { page_limit },
    );
    TestApp {
        router: routes().with_state(registry),
        owner,
        borrower,
        book_id,
    }
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    caller: Option<UserId>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header("x-user-id", caller.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn request_loan(app: &TestApp) -> String {
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/loan/request",
        Some(app.borrower),
        Some(json!({ "bookId": app.book_id, "borrowerId": app.borrower })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["state"], "Requested");
    body["recordId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = app(50).await;
    let (status, _) = call(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app.router, Method::GET, "/health/db", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[rstest]
#[case(Method::POST, "/loan/request")]
#[case(Method::GET, "/loans")]
#[case(Method::POST, "/loan/5b4c96ac-316a-4bee-8e69-cac5eb84ff4c/request-return")]
#[case(Method::GET, "/notifications/5b4c96ac-316a-4bee-8e69-cac5eb84ff4c")]
#[case(Method::PUT, "/users/me/push-token")]
#[tokio::test]
async fn requests_without_caller_are_unauthorized(#[case] method: Method, #[case] uri: &str) {
    let app = app(50).await;
    let (status, _) = call(&app.router, method, uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn borrowing_on_behalf_of_someone_else_is_forbidden() {
    let app = app(50).await;
    let (status, _) = call(
        &app.router,
        Method::POST,
        "/loan/request",
        Some(app.owner),
        Some(json!({ "bookId": app.book_id, "borrowerId": app.borrower })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn second_request_for_lent_book_conflicts() {
    let app = app(50).await;
    request_loan(&app).await;

    let other = UserId::new();
    let (status, _) = call(
        &app.router,
        Method::POST,
        "/loan/request",
        Some(other),
        Some(json!({ "bookId": app.book_id, "borrowerId": other })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn only_the_owner_may_confirm() {
    let app = app(50).await;
    let loan_id = request_loan(&app).await;

    let uri = format!("/loan/{loan_id}/confirm-borrow");
    let (status, _) = call(
        &app.router,
        Method::POST,
        &uri,
        Some(app.borrower),
        Some(json!({ "decision": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/loan/{loan_id}");
    let (status, body) = call(&app.router, Method::GET, &uri, Some(app.owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "Requested");
    assert!(body["confirmedAt"].is_null());
}

#[tokio::test]
async fn pending_notifications_are_listed_for_their_recipient_only() {
    let app = app(50).await;
    let loan_id = request_loan(&app).await;

    let uri = format!("/notifications/{}", app.owner);
    let (status, _) = call(&app.router, Method::GET, &uri, Some(app.borrower), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app.router, Method::GET, &uri, Some(app.owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "BorrowRequest");
    assert_eq!(items[0]["recordId"], loan_id.as_str());
    assert_eq!(items[0]["bookName"], "Rust in Action");
    assert_eq!(items[0]["userName"], "Bob");
    assert_eq!(items[0]["profilePicture"], "https://example.com/bob.png");
    assert!(body["next"].is_null());

    // 承認後は借り手に確認通知が届き、オーナーの一覧からは消える
    let (status, _) = call(
        &app.router,
        Method::POST,
        &format!("/loan/{loan_id}/confirm-borrow"),
        Some(app.owner),
        Some(json!({ "decision": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&app.router, Method::GET, &uri, Some(app.owner), None).await;
    assert!(body["items"].as_array().unwrap().is_empty());

    let uri = format!("/notifications/{}", app.borrower);
    let (_, body) = call(&app.router, Method::GET, &uri, Some(app.borrower), None).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "BorrowConfirmed");
    assert_eq!(items[0]["userName"], "Alice");
}

#[tokio::test]
async fn pending_list_pages_with_cursor() {
    let app = app(1).await;
    let loan_id = request_loan(&app).await;
    call(
        &app.router,
        Method::POST,
        &format!("/loan/{loan_id}/confirm-borrow"),
        Some(app.owner),
        Some(json!({ "decision": true })),
    )
    .await;
    call(
        &app.router,
        Method::POST,
        &format!("/loan/{loan_id}/request-return"),
        Some(app.borrower),
        None,
    )
    .await;
    // 借り手側に残っているのは貸出確認の通知ひとつだけ
    let uri = format!("/notifications/{}?limit=1", app.borrower);
    let (_, first) = call(&app.router, Method::GET, &uri, Some(app.borrower), None).await;
    assert_eq!(first["items"].as_array().unwrap().len(), 1);
    let next = first["next"].as_str().unwrap().to_string();

    let uri = format!("/notifications/{}?limit=1&after={}", app.borrower, next);
    let (status, second) = call(&app.router, Method::GET, &uri, Some(app.borrower), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(second["items"].as_array().unwrap().is_empty());
    assert!(second["next"].is_null());
}

#[tokio::test]
async fn invalid_limit_is_rejected() {
    let app = app(50).await;
    let uri = format!("/notifications/{}?limit=0", app.owner);
    let (status, _) = call(&app.router, Method::GET, &uri, Some(app.owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn acknowledged_notification_leaves_the_list() {
    let app = app(50).await;
    request_loan(&app).await;
    let uri = format!("/notifications/{}", app.owner);
    let (_, body) = call(&app.router, Method::GET, &uri, Some(app.owner), None).await;
    let notification_id = body["items"][0]["notificationId"].as_str().unwrap().to_string();

    let ack = format!("/notifications/{notification_id}/acknowledge");
    let (status, _) = call(&app.router, Method::POST, &ack, Some(app.borrower), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app.router, Method::POST, &ack, Some(app.owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app.router, Method::GET, &uri, Some(app.owner), None).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_push_token_is_rejected() {
    let app = app(50).await;
    let (status, _) = call(
        &app.router,
        Method::PUT,
        "/users/me/push-token",
        Some(app.owner),
        Some(json!({ "token": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(
        &app.router,
        Method::PUT,
        "/users/me/push-token",
        Some(app.owner),
        Some(json!({ "token": "device-token-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
