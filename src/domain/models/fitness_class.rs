use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClassCategory {
    Yoga,
    Zumba,
    Hiit,
}

impl ClassCategory {
    pub const ALL: [ClassCategory; 3] = [ClassCategory::Yoga, ClassCategory::Zumba, ClassCategory::Hiit];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassCategory::Yoga => "YOGA",
            ClassCategory::Zumba => "ZUMBA",
            ClassCategory::Hiit => "HIIT",
        }
    }

    /// Human readable name shown next to the stored code.
    pub fn label(&self) -> &'static str {
        match self {
            ClassCategory::Yoga => "Yoga",
            ClassCategory::Zumba => "Zumba",
            ClassCategory::Hiit => "HIIT",
        }
    }
}

impl fmt::Display for ClassCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let choices: Vec<&str> = ClassCategory::ALL.iter().map(ClassCategory::as_str).collect();
        write!(f, "Invalid class type '{}'. Choose from: {}", self.0, choices.join(", "))
    }
}

impl FromStr for ClassCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "YOGA" => Ok(ClassCategory::Yoga),
            "ZUMBA" => Ok(ClassCategory::Zumba),
            "HIIT" => Ok(ClassCategory::Hiit),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// A scheduled class. `available_slots` is a cached value derived from the
/// live booking set and is only ever written inside a transaction that holds
/// the class row.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct FitnessClass {
    pub id: String,
    pub category: String,
    pub start_time: DateTime<Utc>,
    pub instructor: String,
    pub total_capacity: i32,
    pub available_slots: i32,
    pub duration_min: Option<i32>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewClassParams {
    pub category: ClassCategory,
    pub start_time: DateTime<Utc>,
    pub instructor: String,
    pub total_capacity: i32,
    pub duration_min: Option<i32>,
    pub location: Option<String>,
}

impl FitnessClass {
    pub fn new(params: NewClassParams, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category: params.category.as_str().to_string(),
            start_time: params.start_time,
            instructor: params.instructor,
            total_capacity: params.total_capacity,
            available_slots: params.total_capacity,
            duration_min: params.duration_min,
            location: params.location,
            created_at: now,
        }
    }

    pub fn category(&self) -> Option<ClassCategory> {
        self.category.parse().ok()
    }

    pub fn active_bookings(&self) -> i32 {
        self.total_capacity - self.available_slots
    }
}

/// Validated partial update for a class. `None` leaves a field untouched;
/// for the nullable columns `Some(None)` clears the value.
#[derive(Debug, Default, Clone)]
pub struct ClassChanges {
    pub category: Option<ClassCategory>,
    pub start_time: Option<DateTime<Utc>>,
    pub instructor: Option<String>,
    pub total_capacity: Option<i32>,
    pub duration_min: Option<Option<i32>>,
    pub location: Option<Option<String>>,
}

impl ClassChanges {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.start_time.is_none()
            && self.instructor.is_none()
            && self.total_capacity.is_none()
            && self.duration_min.is_none()
            && self.location.is_none()
    }

    /// Applies every field except the capacity pair, which the caller must
    /// reconcile against the booking count under the row lock.
    pub fn apply_descriptive(&self, class: &mut FitnessClass) {
        if let Some(category) = self.category {
            class.category = category.as_str().to_string();
        }
        if let Some(start) = self.start_time {
            class.start_time = start;
        }
        if let Some(instructor) = &self.instructor {
            class.instructor = instructor.clone();
        }
        if let Some(duration) = self.duration_min {
            class.duration_min = duration;
        }
        if let Some(location) = &self.location {
            class.location = location.clone();
        }
    }
}
