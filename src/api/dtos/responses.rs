use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::domain::models::fitness_class::FitnessClass;

/// A class as rendered to clients: the stored UTC start plus the same
/// instant in the requested zone.
#[derive(Serialize)]
pub struct ClassResponse {
    pub id: String,
    pub category: String,
    pub category_label: &'static str,
    pub start_time: DateTime<Utc>,
    pub local_start_time: String,
    pub timezone: String,
    pub instructor: String,
    pub total_capacity: i32,
    pub available_slots: i32,
    pub duration_min: Option<i32>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ClassResponse {
    pub fn render(class: FitnessClass, tz: Tz) -> Self {
        let category_label = class.category().map(|c| c.label()).unwrap_or("Unknown");
        Self {
            local_start_time: class.start_time.with_timezone(&tz).to_rfc3339(),
            timezone: tz.name().to_string(),
            category_label,
            id: class.id,
            category: class.category,
            start_time: class.start_time,
            instructor: class.instructor,
            total_capacity: class.total_capacity,
            available_slots: class.available_slots,
            duration_min: class.duration_min,
            location: class.location,
            created_at: class.created_at,
        }
    }
}
