use fitness_studio::{
    api::router::create_router,
    config::Config,
    domain::models::user::{Role, User},
    domain::ports::{BookingRepository, ClassRepository, Clock},
    domain::services::auth_service::hash_password,
    infra::factory::{assemble_state, connect},
    state::AppState,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

/// A clock the test moves by hand.
pub struct FixedClock(Mutex<DateTime<Utc>>);

#[allow(dead_code)]
impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap() = at;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// 2030-01-01T09:00:00Z, the starting "now" of every test.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap()
}

pub const PASSWORD: &str = "correct-horse-battery";

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub clock: Arc<FixedClock>,
    pub classes: Arc<dyn ClassRepository>,
    pub bookings: Arc<dyn BookingRepository>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        Self::with_lock_timeout(5000).await
    }

    /// Same as `new`, but with a custom bound on how long a write waits for
    /// a locked class row.
    pub async fn with_lock_timeout(lock_timeout_ms: u64) -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let priv_key_pem = include_str!("../tests/keys/test_private.pem");
        let pub_key_pem = include_str!("../tests/keys/test_public.pem");

        let config = Config {
            database_url: db_url,
            port: 0,
            jwt_secret_key: priv_key_pem.to_string(),
            jwt_public_key: pub_key_pem.to_string(),
            auth_issuer: "test-issuer".to_string(),
            default_timezone: "Asia/Kolkata".to_string(),
            lock_timeout_ms,
            db_max_connections: 5,
            log_dir: "./logs".to_string(),
            admin_username: None,
            admin_email: None,
            admin_password: None,
        };

        let repos = connect(&config).await.expect("Failed to open test db");
        let classes = repos.classes.clone();
        let bookings = repos.bookings.clone();

        let clock = Arc::new(FixedClock::new(epoch()));
        let state = Arc::new(assemble_state(&config, repos, clock.clone()).expect("Failed to build state"));
        let router = create_router(state.clone());

        Self { router, db_filename, state, clock, classes, bookings }
    }

    pub async fn create_user(&self, username: &str, email: &str, role: Role) -> User {
        let user = User::new(username.to_string(), email.to_string(), hash_password(PASSWORD).unwrap(), role);
        self.state.user_repo.create(&user).await.unwrap()
    }

    /// Creates the user on first use and returns a bearer token for them.
    pub async fn token_for(&self, username: &str, email: &str, role: Role) -> String {
        if self.state.user_repo.find_by_username(username).await.unwrap().is_none() {
            self.create_user(username, email, role).await;
        }
        self.login(username, PASSWORD).await["access_token"].as_str().unwrap().to_string()
    }

    pub async fn staff_token(&self) -> String {
        self.token_for("coach", "coach@studio.test", Role::Trainer).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Value {
        let res = self.send("POST", "/api/v1/auth/login", None, Some(serde_json::json!({
            "username": username,
            "password": password
        }))).await;

        if res.status() != StatusCode::OK {
            panic!("Login failed in test helper: status {}", res.status());
        }
        parse_body(res).await
    }

    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    /// Creates a class through the API and returns its JSON.
    pub async fn create_class(&self, token: &str, category: &str, start: DateTime<Utc>, capacity: i32) -> Value {
        let res = self.send("POST", "/api/v1/classes", Some(token), Some(serde_json::json!({
            "category": category,
            "start_time": start.to_rfc3339(),
            "instructor": "Asha",
            "total_capacity": capacity,
            "duration_min": 60,
            "location": "Studio A"
        }))).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        parse_body(res).await
    }

    pub async fn book(&self, class_id: &str, name: &str, email: &str) -> Response {
        self.send("POST", "/api/v1/bookings", None, Some(serde_json::json!({
            "class_id": class_id,
            "client_name": name,
            "client_email": email
        }))).await
    }

    pub async fn available_slots(&self, class_id: &str) -> i64 {
        let res = self.send("GET", &format!("/api/v1/classes/{class_id}"), None, None).await;
        parse_body(res).await["available_slots"].as_i64().unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.db_filename, suffix));
        }
    }
}

pub async fn parse_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
