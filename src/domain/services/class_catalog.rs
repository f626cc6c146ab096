use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::models::fitness_class::{ClassCategory, ClassChanges, FitnessClass, NewClassParams};
use crate::domain::ports::{ClassRepository, Clock};
use crate::error::{AppError, FieldError};

/// Unvalidated input for a new class, as received from the caller.
#[derive(Debug, Clone)]
pub struct ClassDraft {
    pub category: String,
    pub start_time: String,
    pub instructor: String,
    pub total_capacity: i32,
    pub duration_min: Option<i32>,
    pub location: Option<String>,
}

/// Unvalidated partial update. Absent fields are left untouched; an empty
/// `location` clears it.
#[derive(Debug, Clone, Default)]
pub struct ClassPatch {
    pub category: Option<String>,
    pub start_time: Option<String>,
    pub instructor: Option<String>,
    pub total_capacity: Option<i32>,
    pub duration_min: Option<i32>,
    pub location: Option<String>,
}

pub struct ClassCatalog {
    repo: Arc<dyn ClassRepository>,
    clock: Arc<dyn Clock>,
}

impl ClassCatalog {
    pub fn new(repo: Arc<dyn ClassRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn create_class(&self, draft: ClassDraft) -> Result<FitnessClass, AppError> {
        let now = self.clock.now();
        let mut errors = Vec::new();

        let category = parse_category(&draft.category).map_err(|e| errors.push(e)).ok();
        let start_time = parse_future_start(&draft.start_time, now).map_err(|e| errors.push(e)).ok();

        if let Err(e) = check_capacity(draft.total_capacity) {
            errors.push(e);
        }
        if draft.instructor.trim().is_empty() {
            errors.push(FieldError::new("instructor", "Instructor is required"));
        }
        if let Some(Err(e)) = draft.duration_min.map(check_duration) {
            errors.push(e);
        }

        let (Some(category), Some(start_time), true) = (category, start_time, errors.is_empty()) else {
            return Err(AppError::Validation(errors));
        };

        let class = FitnessClass::new(NewClassParams {
            category,
            start_time,
            instructor: draft.instructor.trim().to_string(),
            total_capacity: draft.total_capacity,
            duration_min: draft.duration_min,
            location: draft.location.filter(|l| !l.trim().is_empty()),
        }, now);

        let created = self.repo.create(&class).await?;
        info!(class_id = %created.id, category = %created.category, "Created fitness class");
        Ok(created)
    }

    /// Classes that have not started yet, earliest first.
    pub async fn list_upcoming(&self, category: Option<&str>) -> Result<Vec<FitnessClass>, AppError> {
        let category = match category.map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => Some(parse_category(raw).map_err(|e| AppError::Validation(vec![e]))?),
            None => None,
        };

        self.repo
            .list_upcoming(self.clock.now(), category.as_ref().map(ClassCategory::as_str))
            .await
    }

    pub async fn get_class(&self, id: &str) -> Result<FitnessClass, AppError> {
        self.repo.find_by_id(id).await?.ok_or_else(AppError::class_not_found)
    }

    pub async fn update_class(&self, id: &str, patch: ClassPatch) -> Result<FitnessClass, AppError> {
        let changes = self.validate_patch(patch)?;

        if changes.is_empty() {
            return self.get_class(id).await;
        }

        let updated = self.repo.update(id, &changes).await?;
        info!(
            class_id = %updated.id,
            total_capacity = updated.total_capacity,
            available_slots = updated.available_slots,
            "Updated fitness class"
        );
        Ok(updated)
    }

    pub async fn delete_class(&self, id: &str) -> Result<(), AppError> {
        self.repo.delete(id).await?;
        info!(class_id = %id, "Deleted fitness class and its bookings");
        Ok(())
    }

    fn validate_patch(&self, patch: ClassPatch) -> Result<ClassChanges, AppError> {
        let now = self.clock.now();
        let mut errors = Vec::new();
        let mut changes = ClassChanges::default();

        if let Some(raw) = patch.category {
            match parse_category(&raw) {
                Ok(c) => changes.category = Some(c),
                Err(e) => errors.push(e),
            }
        }
        if let Some(raw) = patch.start_time {
            match parse_future_start(&raw, now) {
                Ok(t) => changes.start_time = Some(t),
                Err(e) => errors.push(e),
            }
        }
        if let Some(instructor) = patch.instructor {
            if instructor.trim().is_empty() {
                errors.push(FieldError::new("instructor", "Instructor is required"));
            } else {
                changes.instructor = Some(instructor.trim().to_string());
            }
        }
        if let Some(total) = patch.total_capacity {
            match check_capacity(total) {
                Ok(()) => changes.total_capacity = Some(total),
                Err(e) => errors.push(e),
            }
        }
        if let Some(duration) = patch.duration_min {
            match check_duration(duration) {
                Ok(()) => changes.duration_min = Some(Some(duration)),
                Err(e) => errors.push(e),
            }
        }
        if let Some(location) = patch.location {
            let trimmed = location.trim();
            changes.location = Some((!trimmed.is_empty()).then(|| trimmed.to_string()));
        }

        if errors.is_empty() { Ok(changes) } else { Err(AppError::Validation(errors)) }
    }
}

fn parse_category(raw: &str) -> Result<ClassCategory, FieldError> {
    raw.parse::<ClassCategory>()
        .map_err(|e| FieldError::new("category", e.to_string()))
}

fn parse_future_start(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, FieldError> {
    let start = DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|_| FieldError::new(
            "start_time",
            "Invalid start_time format. Use ISO 8601 with an offset (e.g. '2025-06-14T09:00:00+05:30')",
        ))?
        .with_timezone(&Utc);

    if start <= now {
        return Err(FieldError::new("start_time", "Class start time must be in the future"));
    }
    Ok(start)
}

fn check_capacity(total: i32) -> Result<(), FieldError> {
    if total <= 0 {
        return Err(FieldError::new("total_capacity", "Total capacity must be greater than 0"));
    }
    Ok(())
}

fn check_duration(minutes: i32) -> Result<(), FieldError> {
    if minutes <= 0 {
        return Err(FieldError::new("duration_min", "Duration must be a positive number of minutes"));
    }
    Ok(())
}
