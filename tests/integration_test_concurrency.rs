mod common;

use chrono::Duration;
use common::{epoch, TestApp};
use fitness_studio::domain::models::booking::{Booking, NewBookingParams};
use fitness_studio::domain::models::fitness_class::ClassChanges;
use fitness_studio::domain::models::user::{Requester, Role};
use fitness_studio::domain::services::reservation_ledger::BookingRequest;
use fitness_studio::error::AppError;
use sqlx::sqlite::SqlitePoolOptions;
use std::time::Instant;
use tokio::task::JoinSet;

async fn open_class(app: &TestApp, capacity: i32) -> String {
    let token = app.staff_token().await;
    let class = app.create_class(&token, "HIIT", epoch() + Duration::days(1), capacity).await;
    class["id"].as_str().unwrap().to_string()
}

fn booking_for(class_id: &str, email: &str) -> Booking {
    Booking::new(NewBookingParams {
        class_id: class_id.to_string(),
        client_name: "Racer".to_string(),
        client_email: email.to_string(),
        booking_time: epoch(),
    }, epoch())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_clients_race_for_the_last_slot() {
    let app = TestApp::new().await;
    let class_id = open_class(&app, 1).await;

    let first = booking_for(&class_id, "first@example.com");
    let second = booking_for(&class_id, "second@example.com");
    let (a, b) = tokio::join!(
        app.bookings.reserve(&first, epoch()),
        app.bookings.reserve(&second, epoch()),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(outcomes.iter().filter(|r| matches!(r, Err(AppError::NoSlots))).count(), 1);

    let class = app.classes.find_by_id(&class_id).await.unwrap().unwrap();
    assert_eq!(class.available_slots, 0);
    assert_eq!(app.bookings.count_by_class(&class_id).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_clients_never_oversell() {
    let app = TestApp::new().await;
    let class_id = open_class(&app, 3).await;

    let mut tasks = JoinSet::new();
    for i in 0..20 {
        let ledger = app.state.ledger.clone();
        let request = BookingRequest {
            class_id: class_id.clone(),
            client_name: format!("Client {i}"),
            client_email: format!("client{i}@example.com"),
            booking_time: None,
        };
        tasks.spawn(async move { ledger.create_booking(request, None).await });
    }

    let mut accepted = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => accepted += 1,
            Err(AppError::NoSlots) => {}
            Err(other) => panic!("unexpected rejection: {other:?}"),
        }
    }

    assert_eq!(accepted, 3);
    let class = app.classes.find_by_id(&class_id).await.unwrap().unwrap();
    assert_eq!(class.available_slots, 0);
    assert_eq!(app.bookings.count_by_class(&class_id).await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_client_racing_books_once() {
    let app = TestApp::new().await;
    let class_id = open_class(&app, 5).await;

    let first = booking_for(&class_id, "twin@example.com");
    let second = booking_for(&class_id, "twin@example.com");
    let (a, b) = tokio::join!(
        app.bookings.reserve(&first, epoch()),
        app.bookings.reserve(&second, epoch()),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(outcomes.iter().filter(|r| matches!(r, Err(AppError::DuplicateBooking))).count(), 1);

    let class = app.classes.find_by_id(&class_id).await.unwrap().unwrap();
    assert_eq!(class.available_slots, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_and_book_interleave_consistently() {
    let app = TestApp::new().await;
    let class_id = open_class(&app, 1).await;
    let held = app.bookings.reserve(&booking_for(&class_id, "holder@example.com"), epoch()).await.unwrap();

    let staff = Requester { user_id: "staff".into(), email: "coach@studio.test".into(), role: Role::Trainer };
    let newcomer = booking_for(&class_id, "newcomer@example.com");
    let (released, reserved) = tokio::join!(
        app.bookings.release(&held.id, &staff),
        app.bookings.reserve(&newcomer, epoch()),
    );
    released.unwrap();

    let active = app.bookings.count_by_class(&class_id).await.unwrap();
    let class = app.classes.find_by_id(&class_id).await.unwrap().unwrap();
    // Either order is valid; the counter always matches the booking set.
    match reserved {
        Ok(_) => assert_eq!(active, 1),
        Err(AppError::NoSlots) => assert_eq!(active, 0),
        Err(other) => panic!("unexpected rejection: {other:?}"),
    }
    assert_eq!(i64::from(class.available_slots), 1 - active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_edits_racing_bookings_keep_counter_consistent() {
    let app = TestApp::new().await;
    let class_id = open_class(&app, 4).await;
    let capacities = [2, 6, 1, 5, 3];

    let mut tasks: JoinSet<Result<(), AppError>> = JoinSet::new();
    for (i, total) in capacities.into_iter().enumerate() {
        let classes = app.classes.clone();
        let id = class_id.clone();
        tasks.spawn(async move {
            let changes = ClassChanges { total_capacity: Some(total), ..Default::default() };
            let class = classes.update(&id, &changes).await?;
            assert_eq!(class.total_capacity, total);
            Ok(())
        });

        for j in 0..2 {
            let bookings = app.bookings.clone();
            let booking = booking_for(&class_id, &format!("client{i}-{j}@example.com"));
            tasks.spawn(async move {
                match bookings.reserve(&booking, epoch()).await {
                    Ok(_) | Err(AppError::NoSlots) => Ok(()),
                    Err(other) => Err(other),
                }
            });
        }
    }

    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    let class = app.classes.find_by_id(&class_id).await.unwrap().unwrap();
    let active = app.bookings.count_by_class(&class_id).await.unwrap();
    assert!(capacities.contains(&class.total_capacity));
    assert!(class.available_slots >= 0 && class.available_slots <= class.total_capacity);
    assert_eq!(
        i64::from(class.available_slots),
        (i64::from(class.total_capacity) - active).max(0)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lock_wait_past_timeout_is_a_conflict() {
    let app = TestApp::with_lock_timeout(200).await;
    let class_id = open_class(&app, 3).await;

    let holder = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}", app.db_filename))
        .await
        .unwrap();
    let mut held = holder.begin().await.unwrap();
    sqlx::query("UPDATE fitness_classes SET available_slots = available_slots WHERE id = ?")
        .bind(&class_id)
        .execute(&mut *held)
        .await
        .unwrap();

    let started = Instant::now();
    let outcome = app.bookings.reserve(&booking_for(&class_id, "waiting@example.com"), epoch()).await;
    let waited = started.elapsed();

    assert!(matches!(outcome, Err(AppError::Conflict(_))), "unexpected outcome: {outcome:?}");
    assert!(waited.as_millis() >= 150, "gave up after {waited:?}");
    assert!(waited.as_millis() < 3000, "waited {waited:?}");
    assert_eq!(app.bookings.count_by_class(&class_id).await.unwrap(), 0);

    held.rollback().await.unwrap();
    holder.close().await;

    app.bookings.reserve(&booking_for(&class_id, "waiting@example.com"), epoch()).await.unwrap();
    let class = app.classes.find_by_id(&class_id).await.unwrap().unwrap();
    assert_eq!(class.available_slots, 2);
}
