use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid input")]
    Validation(Vec<FieldError>),
    #[error("{message}")]
    NotFound { field: &'static str, message: String },
    #[error("Cannot book a class that has already started")]
    ExpiredClass,
    #[error("No slots available for this class")]
    NoSlots,
    #[error("Cannot book after class start time")]
    LateBooking,
    #[error("This email has already booked this class")]
    DuplicateBooking,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error")]
    Internal,
    #[error("Internal server error: {0}")]
    InternalWithMsg(String),
}

impl AppError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn class_not_found() -> Self {
        AppError::NotFound { field: "class_id", message: "Class not found".into() }
    }

    pub fn booking_not_found() -> Self {
        AppError::NotFound { field: "booking_id", message: "Booking not found".into() }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::ExpiredClass => "EXPIRED_CLASS",
            AppError::NoSlots => "NO_SLOTS",
            AppError::LateBooking => "LATE_BOOKING",
            AppError::DuplicateBooking => "DUPLICATE_BOOKING",
            AppError::Unauthorized => "UNAUTHENTICATED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) | AppError::Internal | AppError::InternalWithMsg(_) => "INTERNAL_ERROR",
        }
    }

    /// Field each ledger rejection is attributed to.
    fn field(&self) -> Option<&'static str> {
        match self {
            AppError::NotFound { field, .. } => Some(*field),
            AppError::ExpiredClass | AppError::NoSlots => Some("class_id"),
            AppError::LateBooking => Some("booking_time"),
            AppError::DuplicateBooking => Some("client_email"),
            _ => None,
        }
    }
}

/// Maps errors raised inside a writer transaction. Lock-wait expiry and
/// serialization failures become a retryable `Conflict`; everything else
/// stays a database fault.
pub fn tx_error(e: sqlx::Error) -> AppError {
    if matches!(e, sqlx::Error::PoolTimedOut) {
        return AppError::Conflict("Database is busy, please retry".into());
    }
    if let Some(db_err) = e.as_database_error() {
        let code = db_err.code().unwrap_or_default();
        // 55P03 lock_not_available, 40001 serialization_failure, 40P01 deadlock_detected
        // 5/261/517/773 SQLITE_BUSY*, 6/262 SQLITE_LOCKED*
        if matches!(&*code, "55P03" | "40001" | "40P01" | "5" | "261" | "517" | "773" | "6" | "262") {
            warn!("Transaction aborted on lock contention (code {})", code);
            return AppError::Conflict("Class is being modified concurrently, please retry".into());
        }
    }
    AppError::Database(e)
}

/// 2067 = SQLite unique constraint, 23505 = PostgreSQL unique violation.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code == "2067" || code == "23505")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                if is_unique_violation(e) {
                    return (
                        StatusCode::CONFLICT,
                        Json(json!({ "error": "Resource already exists (duplicate entry)", "code": "CONFLICT" }))
                    ).into_response();
                }

                error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid input".to_string()),
            AppError::NotFound { message, .. } => (StatusCode::NOT_FOUND, message.clone()),
            AppError::ExpiredClass
            | AppError::NoSlots
            | AppError::LateBooking
            | AppError::DuplicateBooking => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
            AppError::InternalWithMsg(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };

        let mut body = json!({
            "error": message,
            "code": self.code(),
        });

        let mut fields = Map::new();
        match &self {
            AppError::Validation(errors) => {
                for e in errors {
                    let entry = fields.entry(e.field).or_insert_with(|| Value::Array(vec![]));
                    if let Value::Array(list) = entry {
                        list.push(Value::String(e.message.clone()));
                    }
                }
            }
            other => {
                if let Some(field) = other.field() {
                    fields.insert(field.to_string(), json!([message]));
                }
            }
        }
        if !fields.is_empty() {
            body["fields"] = Value::Object(fields);
        }

        (status, Json(body)).into_response()
    }
}
