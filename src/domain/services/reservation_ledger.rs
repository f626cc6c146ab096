use std::sync::Arc;
use chrono::DateTime;
use serde::Serialize;
use tracing::{info, warn};
use validator::ValidateEmail;

use crate::domain::models::booking::{normalize_email, Booking, NewBookingParams};
use crate::domain::models::user::Requester;
use crate::domain::ports::{BookingRepository, ClassRepository, Clock};
use crate::domain::services::admission::{authorize_cancellation, authorize_listing, reconcile_available};
use crate::error::{AppError, FieldError};

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub class_id: String,
    pub client_name: String,
    pub client_email: String,
    /// ISO 8601 with offset; defaults to now.
    pub booking_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub class_id: String,
    pub total_capacity: i32,
    pub available_slots: i32,
    pub active_bookings: i64,
}

/// Owns bookings and the slot-accounting invariant. Every mutation goes
/// through a single repository transaction that holds the class row.
pub struct ReservationLedger {
    bookings: Arc<dyn BookingRepository>,
    classes: Arc<dyn ClassRepository>,
    clock: Arc<dyn Clock>,
}

impl ReservationLedger {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        classes: Arc<dyn ClassRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { bookings, classes, clock }
    }

    pub async fn create_booking(
        &self,
        request: BookingRequest,
        requester: Option<&Requester>,
    ) -> Result<Booking, AppError> {
        let now = self.clock.now();
        let mut errors = Vec::new();

        if request.class_id.trim().is_empty() {
            errors.push(FieldError::new("class_id", "class_id is required"));
        }
        if request.client_name.trim().is_empty() {
            errors.push(FieldError::new("client_name", "Client name is required"));
        }
        let email = normalize_email(&request.client_email);
        if !email.validate_email() {
            errors.push(FieldError::new("client_email", "Enter a valid email address"));
        }
        let booking_time = match request.booking_time.as_deref().map(str::trim) {
            None | Some("") => Some(now),
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(t) => Some(t.to_utc()),
                Err(_) => {
                    errors.push(FieldError::new("booking_time", "Invalid booking_time format. Use ISO 8601 with an offset"));
                    None
                }
            },
        };

        let (Some(booking_time), true) = (booking_time, errors.is_empty()) else {
            return Err(AppError::Validation(errors));
        };

        if let Some(r) = requester
            && !r.is_privileged()
            && !r.owns(&email)
        {
            return Err(AppError::Forbidden("You can only book for your own email".into()));
        }

        let booking = Booking::new(NewBookingParams {
            class_id: request.class_id.trim().to_string(),
            client_name: request.client_name.trim().to_string(),
            client_email: email,
            booking_time,
        }, now);

        match self.bookings.reserve(&booking, now).await {
            Ok(created) => {
                info!(booking_id = %created.id, class_id = %created.class_id, "Booking confirmed");
                Ok(created)
            }
            Err(e) => {
                warn!(class_id = %booking.class_id, code = e.code(), "Booking rejected: {}", e);
                Err(e)
            }
        }
    }

    pub async fn cancel_booking(&self, booking_id: &str, requester: &Requester) -> Result<(), AppError> {
        let released = self.bookings.release(booking_id, requester).await?;
        info!(
            booking_id = %released.id,
            class_id = %released.class_id,
            cancelled_by = %requester.user_id,
            "Booking cancelled"
        );
        Ok(())
    }

    pub async fn get_booking(&self, booking_id: &str, requester: &Requester) -> Result<Booking, AppError> {
        let booking = self.bookings.find_by_id(booking_id).await?.ok_or_else(AppError::booking_not_found)?;
        authorize_cancellation(&booking, requester)
            .map_err(|_| AppError::Forbidden("You can only view your own bookings".into()))?;
        Ok(booking)
    }

    /// Bookings held by `client_email`, or by the requester when omitted.
    pub async fn list_bookings(
        &self,
        client_email: Option<&str>,
        requester: &Requester,
    ) -> Result<Vec<Booking>, AppError> {
        let identity = normalize_email(client_email.unwrap_or(&requester.email));
        if identity.is_empty() {
            return Err(AppError::invalid("email", "A client identity is required"));
        }
        authorize_listing(&identity, requester)?;
        self.bookings.list_by_client(&identity).await
    }

    pub async fn list_class_bookings(&self, class_id: &str, requester: &Requester) -> Result<Vec<Booking>, AppError> {
        if !requester.is_privileged() {
            return Err(AppError::Forbidden("Only staff can view a class roster".into()));
        }
        self.classes.find_by_id(class_id).await?.ok_or_else(AppError::class_not_found)?;
        self.bookings.list_by_class(class_id).await
    }

    /// Unlocked snapshot read; may lag a concurrent writer.
    pub async fn availability(&self, class_id: &str) -> Result<Availability, AppError> {
        let class = self.classes.find_by_id(class_id).await?.ok_or_else(AppError::class_not_found)?;
        let active = self.bookings.count_by_class(class_id).await?;

        if reconcile_available(class.total_capacity, active) != class.available_slots {
            warn!(
                class_id = %class_id,
                cached = class.available_slots,
                active,
                "Availability snapshot differs from booking count"
            );
        }

        Ok(Availability {
            class_id: class.id,
            total_capacity: class.total_capacity,
            available_slots: class.available_slots,
            active_bookings: active,
        })
    }
}
