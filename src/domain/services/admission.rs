use crate::domain::models::{booking::Booking, fitness_class::FitnessClass, user::Requester};
use crate::error::AppError;
use chrono::{DateTime, Utc};

/// Booking admission rules, evaluated against a class row that the caller
/// holds locked. The order of the checks is part of the contract: the first
/// failing rule decides the error.
pub fn admit(
    class: &FitnessClass,
    booking_time: DateTime<Utc>,
    now: DateTime<Utc>,
    already_booked: bool,
) -> Result<(), AppError> {
    if class.start_time <= now {
        return Err(AppError::ExpiredClass);
    }
    if class.available_slots <= 0 {
        return Err(AppError::NoSlots);
    }
    if booking_time > class.start_time {
        return Err(AppError::LateBooking);
    }
    if already_booked {
        return Err(AppError::DuplicateBooking);
    }
    Ok(())
}

/// Seats left once `active` bookings are held against `total_capacity`.
/// Shrinking below the booking count floors at zero; nobody is evicted.
pub fn reconcile_available(total_capacity: i32, active: i64) -> i32 {
    (i64::from(total_capacity) - active).clamp(0, i64::from(total_capacity)) as i32
}

/// A class may not be moved earlier than a booking already made for it,
/// otherwise that booking would retroactively become late.
pub fn check_reschedule(new_start: DateTime<Utc>, booking_times: &[DateTime<Utc>]) -> Result<(), AppError> {
    if booking_times.iter().any(|booked_at| *booked_at > new_start) {
        return Err(AppError::invalid(
            "start_time",
            "start_time cannot precede the booking time of an existing booking",
        ));
    }
    Ok(())
}

pub fn authorize_cancellation(booking: &Booking, requester: &Requester) -> Result<(), AppError> {
    if requester.is_privileged() || requester.owns(&booking.client_email) {
        Ok(())
    } else {
        Err(AppError::Forbidden("You can only cancel your own bookings".into()))
    }
}

pub fn authorize_listing(client_email: &str, requester: &Requester) -> Result<(), AppError> {
    if requester.is_privileged() || requester.owns(client_email) {
        Ok(())
    } else {
        Err(AppError::Forbidden("You can only view your own bookings".into()))
    }
}
