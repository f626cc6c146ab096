mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::{epoch, parse_body, TestApp};
use fitness_studio::domain::models::user::Role;
use serde_json::{json, Value};

async fn class_with_capacity(app: &TestApp, capacity: i32) -> String {
    let token = app.staff_token().await;
    let class = app.create_class(&token, "YOGA", epoch() + Duration::hours(3), capacity).await;
    class["id"].as_str().unwrap().to_string()
}

async fn book_at(app: &TestApp, class_id: &str, email: &str, booking_time: &str) -> axum::response::Response {
    app.send("POST", "/api/v1/bookings", None, Some(json!({
        "class_id": class_id,
        "client_name": "Client",
        "client_email": email,
        "booking_time": booking_time
    }))).await
}

fn assert_rejected(body: &Value, code: &str, field: &str) {
    assert_eq!(body["code"], code, "unexpected body: {body}");
    assert!(body["fields"][field].is_array(), "missing field {field}: {body}");
}

#[tokio::test]
async fn test_booking_takes_a_slot() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 2).await;

    let res = app.book(&class_id, "Ana", "  Ana@Example.COM ").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let booking = parse_body(res).await;
    assert_eq!(booking["class_id"], class_id.as_str());
    assert_eq!(booking["client_email"], "ana@example.com");
    assert_eq!(booking["booking_time"], "2030-01-01T09:00:00Z");

    assert_eq!(app.available_slots(&class_id).await, 1);
}

#[tokio::test]
async fn test_book_duplicate_cancel_scenario() {
    let app = TestApp::new().await;
    let staff = app.staff_token().await;
    let class = app.create_class(&staff, "YOGA", epoch() + Duration::days(1), 10).await;
    let class_id = class["id"].as_str().unwrap();
    assert_eq!(class["available_slots"], 10);

    let booking = parse_body(app.book(class_id, "Client A", "a@example.com").await).await;
    assert_eq!(app.available_slots(class_id).await, 9);

    let res = app.book(class_id, "Client A", "a@example.com").await;
    assert_rejected(&parse_body(res).await, "DUPLICATE_BOOKING", "client_email");
    assert_eq!(app.available_slots(class_id).await, 9);

    let res = app.send("DELETE", &format!("/api/v1/bookings/{}", booking["id"].as_str().unwrap()), Some(&staff), None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.available_slots(class_id).await, 10);
}

#[tokio::test]
async fn test_duplicate_email_is_rejected_case_insensitively() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 5).await;

    assert_eq!(app.book(&class_id, "Ana", "ana@example.com").await.status(), StatusCode::CREATED);

    let res = app.book(&class_id, "Ana again", "ANA@example.com").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_rejected(&parse_body(res).await, "DUPLICATE_BOOKING", "client_email");

    assert_eq!(app.available_slots(&class_id).await, 4);
}

#[tokio::test]
async fn test_full_class_rejects_booking() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 1).await;

    assert_eq!(app.book(&class_id, "Ana", "ana@example.com").await.status(), StatusCode::CREATED);

    let res = app.book(&class_id, "Ben", "ben@example.com").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_rejected(&parse_body(res).await, "NO_SLOTS", "class_id");
    assert_eq!(app.available_slots(&class_id).await, 0);
}

#[tokio::test]
async fn test_started_class_rejects_booking() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 3).await;

    // A class starting exactly now has already started.
    app.clock.advance(Duration::hours(3));
    let res = app.book(&class_id, "Ana", "ana@example.com").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_rejected(&parse_body(res).await, "EXPIRED_CLASS", "class_id");
}

#[tokio::test]
async fn test_expired_wins_over_no_slots() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 1).await;
    app.book(&class_id, "Ana", "ana@example.com").await;

    app.clock.advance(Duration::days(1));
    let res = app.book(&class_id, "Ben", "ben@example.com").await;
    assert_rejected(&parse_body(res).await, "EXPIRED_CLASS", "class_id");
}

#[tokio::test]
async fn test_no_slots_wins_over_duplicate() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 1).await;
    app.book(&class_id, "Ana", "ana@example.com").await;

    let res = app.book(&class_id, "Ana", "ana@example.com").await;
    assert_rejected(&parse_body(res).await, "NO_SLOTS", "class_id");
}

#[tokio::test]
async fn test_booking_time_boundary_is_inclusive() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 3).await;
    let start = epoch() + Duration::hours(3);

    let one_micro_late = (start + Duration::microseconds(1)).to_rfc3339();
    assert!(one_micro_late.contains(".000001"));
    let res = book_at(&app, &class_id, "late@example.com", &one_micro_late).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_rejected(&parse_body(res).await, "LATE_BOOKING", "booking_time");

    let res = book_at(&app, &class_id, "ontime@example.com", &start.to_rfc3339()).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(app.available_slots(&class_id).await, 2);
}

#[tokio::test]
async fn test_booking_input_is_validated() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 3).await;

    let res = app.send("POST", "/api/v1/bookings", None, Some(json!({
        "class_id": class_id,
        "client_name": "",
        "client_email": "not-an-email",
        "booking_time": "yesterday"
    }))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = parse_body(res).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    for field in ["client_name", "client_email", "booking_time"] {
        assert!(body["fields"][field].is_array(), "missing error for {field}: {body}");
    }

    let res = app.book("missing-class", "Ana", "ana@example.com").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(parse_body(res).await["fields"]["class_id"].is_array());

    let res = app.send("POST", "/api/v1/bookings", None, Some(json!({ "class_id": 42 }))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(parse_body(res).await["fields"]["body"].is_array());
}

#[tokio::test]
async fn test_member_books_only_for_own_email() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 3).await;
    let member = app.token_for("mia", "mia@example.com", Role::Member).await;

    let res = app.send("POST", "/api/v1/bookings", Some(&member), Some(json!({
        "class_id": class_id,
        "client_name": "Someone",
        "client_email": "someone@example.com"
    }))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.send("POST", "/api/v1/bookings", Some(&member), Some(json!({
        "class_id": class_id,
        "client_name": "Mia",
        "client_email": "MIA@example.com"
    }))).await;
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_cancel_restores_the_slot() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 2).await;
    let member = app.token_for("mia", "mia@example.com", Role::Member).await;

    let booking = parse_body(app.book(&class_id, "Mia", "mia@example.com").await).await;
    let booking_id = booking["id"].as_str().unwrap();
    assert_eq!(app.available_slots(&class_id).await, 1);

    let res = app.send("DELETE", &format!("/api/v1/bookings/{booking_id}"), Some(&member), None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.available_slots(&class_id).await, 2);

    let res = app.send("DELETE", &format!("/api/v1/bookings/{booking_id}"), Some(&member), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(parse_body(res).await["fields"]["booking_id"].is_array());

    // The same email may book again once the seat is released.
    assert_eq!(app.book(&class_id, "Mia", "mia@example.com").await.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_cancel_after_shrink_keeps_counter_consistent() {
    let app = TestApp::new().await;
    let staff = app.staff_token().await;
    let class = app.create_class(&staff, "HIIT", epoch() + Duration::days(1), 4).await;
    let class_id = class["id"].as_str().unwrap();

    let mut ids = Vec::new();
    for i in 0..4 {
        let booking = parse_body(app.book(class_id, "Client", &format!("c{i}@example.com")).await).await;
        ids.push(booking["id"].as_str().unwrap().to_string());
    }
    app.send("PATCH", &format!("/api/v1/classes/{class_id}"), Some(&staff), Some(json!({ "total_capacity": 2 }))).await;
    assert_eq!(app.available_slots(class_id).await, 0);

    // Still over-booked after one cancellation: three active against two seats.
    app.send("DELETE", &format!("/api/v1/bookings/{}", ids[0]), Some(&staff), None).await;
    assert_eq!(app.available_slots(class_id).await, 0);

    app.send("DELETE", &format!("/api/v1/bookings/{}", ids[1]), Some(&staff), None).await;
    app.send("DELETE", &format!("/api/v1/bookings/{}", ids[2]), Some(&staff), None).await;
    assert_eq!(app.available_slots(class_id).await, 1);
}

#[tokio::test]
async fn test_only_owner_or_staff_may_cancel() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 3).await;
    let staff = app.staff_token().await;
    let intruder = app.token_for("ivan", "ivan@example.com", Role::Member).await;

    let booking = parse_body(app.book(&class_id, "Ana", "ana@example.com").await).await;
    let booking_id = booking["id"].as_str().unwrap();

    let res = app.send("DELETE", &format!("/api/v1/bookings/{booking_id}"), None, None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.send("DELETE", &format!("/api/v1/bookings/{booking_id}"), Some(&intruder), None).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.available_slots(&class_id).await, 2);

    let res = app.send("GET", &format!("/api/v1/bookings/{booking_id}"), Some(&intruder), None).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.send("DELETE", &format!("/api/v1/bookings/{booking_id}"), Some(&staff), None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.available_slots(&class_id).await, 3);
}

#[tokio::test]
async fn test_list_bookings_by_client() {
    let app = TestApp::new().await;
    let staff = app.staff_token().await;
    let member = app.token_for("mia", "mia@example.com", Role::Member).await;

    let later = app.create_class(&staff, "HIIT", epoch() + Duration::days(2), 3).await;
    let sooner = app.create_class(&staff, "YOGA", epoch() + Duration::days(1), 3).await;
    app.book(later["id"].as_str().unwrap(), "Mia", "mia@example.com").await;
    app.book(sooner["id"].as_str().unwrap(), "Mia", "mia@example.com").await;
    app.book(sooner["id"].as_str().unwrap(), "Ben", "ben@example.com").await;

    let res = app.send("GET", "/api/v1/bookings", Some(&member), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let list = parse_body(res).await;
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert_eq!(list[0]["class_id"], sooner["id"]);
    assert_eq!(list[1]["class_id"], later["id"]);

    let res = app.send("GET", "/api/v1/bookings?email=ben@example.com", Some(&member), None).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.send("GET", "/api/v1/bookings?email=BEN@example.com", Some(&staff), None).await;
    assert_eq!(parse_body(res).await.as_array().unwrap().len(), 1);

    let res = app.send("GET", "/api/v1/bookings?email=nobody@example.com", Some(&staff), None).await;
    assert_eq!(parse_body(res).await, json!([]));

    let res = app.send("GET", "/api/v1/bookings?email=mia@example.com", None, None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_repeated_email_filter_is_a_validation_error() {
    let app = TestApp::new().await;
    let staff = app.staff_token().await;

    let res = app
        .send("GET", "/api/v1/bookings?email=a@example.com&email=b@example.com", Some(&staff), None)
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = parse_body(res).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["fields"]["query"].is_array());
}

#[tokio::test]
async fn test_availability_snapshot() {
    let app = TestApp::new().await;
    let class_id = class_with_capacity(&app, 3).await;
    app.book(&class_id, "Ana", "ana@example.com").await;

    let res = app.send("GET", &format!("/api/v1/classes/{class_id}/availability"), None, None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_body(res).await;
    assert_eq!(body["total_capacity"], 3);
    assert_eq!(body["available_slots"], 2);
    assert_eq!(body["active_bookings"], 1);
}
