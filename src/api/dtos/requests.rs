use serde::Deserialize;

use crate::domain::services::{
    class_catalog::{ClassDraft, ClassPatch},
    reservation_ledger::BookingRequest,
};

#[derive(Deserialize)]
pub struct CreateClassRequest {
    #[serde(default, alias = "fitnessclass_type")]
    pub category: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub instructor: String,
    #[serde(default)]
    pub total_capacity: i32,
    pub duration_min: Option<i32>,
    pub location: Option<String>,
}

impl From<CreateClassRequest> for ClassDraft {
    fn from(req: CreateClassRequest) -> Self {
        ClassDraft {
            category: req.category,
            start_time: req.start_time,
            instructor: req.instructor,
            total_capacity: req.total_capacity,
            duration_min: req.duration_min,
            location: req.location,
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateClassRequest {
    #[serde(alias = "fitnessclass_type")]
    pub category: Option<String>,
    pub start_time: Option<String>,
    pub instructor: Option<String>,
    pub total_capacity: Option<i32>,
    pub duration_min: Option<i32>,
    pub location: Option<String>,
    /// Present only so a client-supplied value can be rejected.
    pub available_slots: Option<serde_json::Value>,
}

impl From<UpdateClassRequest> for ClassPatch {
    fn from(req: UpdateClassRequest) -> Self {
        ClassPatch {
            category: req.category,
            start_time: req.start_time,
            instructor: req.instructor,
            total_capacity: req.total_capacity,
            duration_min: req.duration_min,
            location: req.location,
        }
    }
}

#[derive(Deserialize)]
pub struct ListClassesQuery {
    #[serde(alias = "fitnessclass_type")]
    pub category: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    #[serde(default)]
    pub class_id: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_email: String,
    pub booking_time: Option<String>,
}

impl From<CreateBookingRequest> for BookingRequest {
    fn from(req: CreateBookingRequest) -> Self {
        BookingRequest {
            class_id: req.class_id,
            client_name: req.client_name,
            client_email: req.client_email,
            booking_time: req.booking_time,
        }
    }
}

#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateStaffRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}
