use axum::{extract::{State, Path}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::{auth::StaffUser, json::ApiJson, query::ApiQuery};
use crate::api::dtos::{
    requests::{CreateClassRequest, ListClassesQuery, UpdateClassRequest},
    responses::ClassResponse,
};
use crate::error::AppError;
use std::sync::Arc;
use chrono_tz::Tz;
use tracing::info;

pub async fn create_class(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    ApiJson(payload): ApiJson<CreateClassRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!(user_id = %staff.user_id, "Creating class");
    let class = state.catalog.create_class(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(ClassResponse::render(class, state.default_timezone))))
}

pub async fn list_classes(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListClassesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let tz = resolve_timezone(&state, query.timezone.as_deref())?;
    let classes = state.catalog.list_upcoming(query.category.as_deref()).await?;

    let rendered: Vec<_> = classes.into_iter().map(|c| ClassResponse::render(c, tz)).collect();
    Ok(Json(rendered))
}

pub async fn get_class(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let class = state.catalog.get_class(&class_id).await?;
    Ok(Json(ClassResponse::render(class, state.default_timezone)))
}

pub async fn update_class(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(class_id): Path<String>,
    ApiJson(payload): ApiJson<UpdateClassRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.available_slots.is_some() {
        return Err(AppError::invalid("available_slots", "available_slots is derived from bookings and cannot be set"));
    }

    info!(user_id = %staff.user_id, class_id = %class_id, "Updating class");
    let class = state.catalog.update_class(&class_id, payload.into()).await?;
    Ok(Json(ClassResponse::render(class, state.default_timezone)))
}

pub async fn delete_class(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    info!(user_id = %staff.user_id, class_id = %class_id, "Deleting class");
    state.catalog.delete_class(&class_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_class_bookings(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bookings = state.ledger.list_class_bookings(&class_id, &staff).await?;
    Ok(Json(bookings))
}

pub async fn class_availability(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let availability = state.ledger.availability(&class_id).await?;
    Ok(Json(availability))
}

fn resolve_timezone(state: &AppState, requested: Option<&str>) -> Result<Tz, AppError> {
    match requested.map(str::trim).filter(|tz| !tz.is_empty()) {
        None => Ok(state.default_timezone),
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| AppError::invalid("timezone", format!("Unknown timezone '{name}'"))),
    }
}
