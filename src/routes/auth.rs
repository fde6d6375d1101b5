use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::entities::{
    model_process,
    project,
    refresh_token::{self, Entity as RefreshToken},
    user::{self, Entity as User},
};
use crate::error::AppError;
use crate::middleware::auth::{issue_access_token, AuthUser};
use crate::services::accounts;
use crate::AppState;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    email: String,
    username: String,
    password: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    user: UserProfile,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct RefreshResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LogoutRequest {
    refresh_token: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LogoutResponse {
    message: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    username: Option<String>,
    avatar: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserProfile {
    #[schema(value_type = String)]
    id: Uuid,
    email: String,
    username: String,
    avatar: Option<String>,
    created_at: chrono::NaiveDateTime,
    last_login_at: Option<chrono::NaiveDateTime>,
}

impl From<user::Model> for UserProfile {
    fn from(user: user::Model) -> Self {
        UserProfile {
            id: user.id,
            email: user.email,
            username: user.username,
            avatar: user.avatar,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileResponse {
    #[serde(flatten)]
    profile: UserProfile,
    project_count: u64,
    model_process_count: u64,
}

fn generate_refresh_token() -> String {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill(&mut random_bytes);
    general_purpose::STANDARD.encode(random_bytes)
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn store_refresh_token(
    db: &DatabaseConnection,
    user_id: Uuid,
    ttl_days: i64,
) -> Result<String, AppError> {
    let token = generate_refresh_token();
    let now = chrono::Utc::now().naive_utc();

    refresh_token::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        token_hash: Set(hash_token(&token)),
        expires_at: Set(now + chrono::Duration::days(ttl_days)),
        created_at: Set(now),
        revoked: Set(false),
    }
    .insert(db)
    .await?;

    Ok(token)
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Invalid email, username or password"),
        (status = 409, description = "Email or username already registered")
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let user = accounts::create_user(&db, &payload.email, &payload.username, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = payload.email.trim().to_lowercase();
    tracing::info!(email = %email, "login attempt");

    let user = User::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&state.db)
        .await?
        .filter(|user| user.is_active && accounts::verify_password(&payload.password, &user.password))
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    let mut active = user.into_active_model();
    active.last_login_at = Set(Some(chrono::Utc::now().naive_utc()));
    let user = active.update(&state.db).await?;

    let ttl = state.config.access_token_ttl_secs;
    let access_token = issue_access_token(&state.config.jwt_secret, &user, ttl)?;
    let refresh_token =
        store_refresh_token(&state.db, user.id, state.config.refresh_token_ttl_days).await?;

    tracing::info!(user_id = %user.id, "tokens issued");
    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        expires_in: ttl,
        user: user.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = RefreshResponse),
        (status = 401, description = "Invalid, revoked or expired refresh token")
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let token = RefreshToken::find()
        .filter(refresh_token::Column::TokenHash.eq(hash_token(&payload.refresh_token)))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token. Please re-login.".to_string()))?;

    if token.revoked {
        return Err(AppError::Unauthorized("User logged out. Please re-login.".to_string()));
    }
    if token.expires_at < chrono::Utc::now().naive_utc() {
        return Err(AppError::Unauthorized("Refresh token expired. Please re-login.".to_string()));
    }

    let user = User::find_by_id(token.user_id)
        .one(&state.db)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found. Please re-login.".to_string()))?;

    let ttl = state.config.access_token_ttl_secs;
    let access_token = issue_access_token(&state.config.jwt_secret, &user, ttl)?;
    Ok(Json(RefreshResponse {
        access_token,
        expires_in: ttl,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out successfully", body = LogoutResponse),
        (status = 404, description = "Refresh token not found")
    ),
    tag = "Authentication"
)]
pub async fn logout(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, AppError> {
    let token = RefreshToken::find()
        .filter(refresh_token::Column::TokenHash.eq(hash_token(&payload.refresh_token)))
        .one(&db)
        .await?
        .ok_or_else(|| AppError::NotFound("Refresh token not found".to_string()))?;

    let mut active = token.into_active_model();
    active.revoked = Set(true);
    active.update(&db).await?;

    Ok(Json(LogoutResponse {
        message: "Logged out successfully".to_string(),
    }))
}

async fn profile(db: &DatabaseConnection, user: user::Model) -> Result<ProfileResponse, AppError> {
    let project_count = project::Entity::find()
        .filter(project::Column::OwnerId.eq(user.id))
        .count(db)
        .await?;
    let model_process_count = model_process::Entity::find()
        .filter(model_process::Column::OwnerId.eq(user.id))
        .count(db)
        .await?;

    Ok(ProfileResponse {
        profile: user.into(),
        project_count,
        model_process_count,
    })
}

async fn current_user(db: &DatabaseConnection, auth_user: &AuthUser) -> Result<user::Model, AppError> {
    User::find_by_id(auth_user.id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "User profile with usage counts", body = ProfileResponse),
        (status = 401, description = "Unauthorized - Invalid or missing token")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Authentication"
)]
pub async fn me(
    State(db): State<DatabaseConnection>,
    auth_user: axum::Extension<AuthUser>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = current_user(&db, &auth_user).await?;
    Ok(Json(profile(&db, user).await?))
}

#[utoipa::path(
    put,
    path = "/auth/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid username"),
        (status = 409, description = "Username already taken")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Authentication"
)]
pub async fn update_me(
    State(db): State<DatabaseConnection>,
    auth_user: axum::Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = current_user(&db, &auth_user).await?;
    let mut active = user.clone().into_active_model();

    if let Some(username) = payload.username.map(|u| u.trim().to_string()) {
        if username != user.username {
            accounts::validate_username(&username)?;
            let taken = User::find()
                .filter(user::Column::Username.eq(username.as_str()))
                .filter(user::Column::Id.ne(user.id))
                .one(&db)
                .await?;
            if taken.is_some() {
                return Err(AppError::Conflict("Username already taken".to_string()));
            }
            active.username = Set(username);
        }
    }
    if let Some(avatar) = payload.avatar {
        active.avatar = Set(Some(avatar).filter(|a| !a.is_empty()));
    }
    active.updated_at = Set(chrono::Utc::now().naive_utc());

    let user = active.update(&db).await?;
    Ok(Json(profile(&db, user).await?))
}
