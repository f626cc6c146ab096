use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::{auth::AuthUser, json::ApiJson};
use crate::api::dtos::requests::{CreateStaffRequest, LoginRequest, RefreshRequest, RegisterRequest};
use crate::domain::models::auth::{AuthResponse, UserProfile};
use crate::domain::models::booking::normalize_email;
use crate::domain::models::user::{Role, User};
use crate::domain::services::auth_service::{hash_password, verify_password};
use crate::error::{AppError, FieldError};
use std::sync::Arc;
use tracing::info;
use validator::ValidateEmail;

const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut user = create_account(&state, payload.username, payload.email, &payload.password, Role::Member).await?;
    user.phone_number = payload.phone_number.filter(|p| !p.trim().is_empty());
    user.bio = payload.bio.filter(|b| !b.trim().is_empty());

    let created = state.user_repo.create(&user).await?;
    info!(user_id = %created.id, "Registered member");

    Ok((StatusCode::CREATED, Json(profile(&created))))
}

pub async fn create_staff(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    ApiJson(payload): ApiJson<CreateStaffRequest>,
) -> Result<impl IntoResponse, AppError> {
    if admin.role != Role::Admin {
        return Err(AppError::Forbidden("Only admins can create staff accounts".into()));
    }
    let role = match payload.role.trim().parse::<Role>() {
        Ok(role) if role.is_staff() => role,
        _ => return Err(AppError::invalid("role", "Role must be 'trainer' or 'admin'")),
    };

    let user = create_account(&state, payload.username, payload.email, &payload.password, role).await?;
    let created = state.user_repo.create(&user).await?;
    info!(user_id = %created.id, role = %created.role, created_by = %admin.user_id, "Created staff account");

    Ok((StatusCode::CREATED, Json(profile(&created))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.user_repo.find_by_username(payload.username.trim()).await?
        .ok_or(AppError::Unauthorized)?;

    verify_password(&payload.password, &user.password_hash)?;

    let (access_token, refresh_token) = state.auth_service.login(&user).await?;

    info!("User logged in: {}", user.id);

    Ok(Json(auth_response(access_token, refresh_token, &user)))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let raw_token = payload.refresh_token.trim();

    let record = state.auth_service.redeem(raw_token).await?;
    let user = state.user_repo.find_by_id(&record.user_id).await?
        .ok_or(AppError::Unauthorized)?;

    let (access_token, refresh_token) = state.auth_service.rotate(&user, &record).await?;

    info!("Token refreshed for user: {}", user.id);

    Ok(Json(auth_response(access_token, refresh_token, &user)))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.logout(payload.refresh_token.trim()).await?;

    info!("User logged out");

    Ok(StatusCode::NO_CONTENT)
}

/// Validates the credentials and builds an unsaved account.
async fn create_account(
    state: &AppState,
    username: String,
    email: String,
    password: &str,
    role: Role,
) -> Result<User, AppError> {
    let username = username.trim().to_string();
    let email = normalize_email(&email);
    let mut errors = Vec::new();

    if username.is_empty() {
        errors.push(FieldError::new("username", "Username is required"));
    }
    if !email.validate_email() {
        errors.push(FieldError::new("email", "Enter a valid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new("password", format!("Password must be at least {MIN_PASSWORD_LEN} characters")));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if state.user_repo.find_by_username(&username).await?.is_some() {
        return Err(AppError::Conflict("Username already exists".into()));
    }
    if state.user_repo.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    Ok(User::new(username, email, hash_password(password)?, role))
}

fn profile(user: &User) -> UserProfile {
    UserProfile {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
    }
}

fn auth_response(access_token: String, refresh_token: String, user: &User) -> AuthResponse {
    AuthResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        user: profile(user),
    }
}
