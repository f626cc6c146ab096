use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// An active reservation of one seat. Rows exist only while the booking is
/// active; cancellation deletes the row.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Booking {
    pub id: String,
    pub class_id: String,
    pub client_name: String,
    pub client_email: String,
    pub booking_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub struct NewBookingParams {
    pub class_id: String,
    pub client_name: String,
    pub client_email: String,
    pub booking_time: DateTime<Utc>,
}

impl Booking {
    pub fn new(params: NewBookingParams, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            class_id: params.class_id,
            client_name: params.client_name,
            client_email: normalize_email(&params.client_email),
            booking_time: params.booking_time,
            created_at: now,
        }
    }
}

/// Client identity is the email address, compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
