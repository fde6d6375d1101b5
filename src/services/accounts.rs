use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::user::{self, Entity as User};
use crate::error::AppError;

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid email address".to_string()))
    }
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if (3..=20).contains(&len) && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Username must be 3-20 letters, digits or underscores".to_string(),
        ))
    }
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    let long_enough = password.chars().count() >= 8;
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if long_enough && has_letter && has_digit {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Password must be at least 8 characters and contain letters and digits".to_string(),
        ))
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalServerError(format!("password hash error: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Validates and creates an account. Email and username must both be unused.
pub async fn create_user(
    db: &DatabaseConnection,
    email: &str,
    username: &str,
    password: &str,
) -> Result<user::Model, AppError> {
    let email = email.trim().to_lowercase();
    let username = username.trim();
    validate_email(&email)?;
    validate_username(username)?;
    validate_password(password)?;

    let taken = User::find()
        .filter(
            Condition::any()
                .add(user::Column::Email.eq(email.as_str()))
                .add(user::Column::Username.eq(username)),
        )
        .one(db)
        .await?;
    if let Some(existing) = taken {
        let field = if existing.email == email { "Email" } else { "Username" };
        return Err(AppError::Conflict(format!("{field} already registered")));
    }

    let now = chrono::Utc::now().naive_utc();
    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        username: Set(username.to_string()),
        password: Set(hash_password(password)?),
        avatar: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        last_login_at: Set(None),
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}
