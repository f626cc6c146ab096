use axum::{extract::{State, Path}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::{auth::AuthUser, json::ApiJson, maybe_auth::MaybeAuthUser, query::ApiQuery};
use crate::api::dtos::requests::{CreateBookingRequest, ListBookingsQuery};
use crate::error::AppError;
use std::sync::Arc;

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(requester): MaybeAuthUser,
    ApiJson(payload): ApiJson<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.ledger.create_booking(payload.into(), requester.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    ApiQuery(query): ApiQuery<ListBookingsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let bookings = state.ledger.list_bookings(query.email.as_deref(), &requester).await?;
    Ok(Json(bookings))
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.ledger.get_booking(&booking_id, &requester).await?;
    Ok(Json(booking))
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.ledger.cancel_booking(&booking_id, &requester).await?;
    Ok(StatusCode::NO_CONTENT)
}
