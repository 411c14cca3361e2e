//! Token authentication.
//!
//! Login exchanges email + password for an opaque token row; every
//! authenticated request carries `Authorization: Token <key>`. Passwords
//! are stored as argon2id hashes.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::{
    entities::{auth_token, user},
    error::AppError,
    SharedState,
};

const TOKEN_SCHEME: &str = "Token ";

/// An authenticated caller, resolved from the `Authorization` header.
pub struct CurrentUser {
    pub user: user::Model,
    pub token: auth_token::Model,
}

/// Like [`CurrentUser`], but anonymous callers pass through as `None`.
pub struct MaybeUser(pub Option<user::Model>);

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let key = token_key(parts).ok_or(AppError::Unauthorized)?;

        let found = auth_token::Entity::find()
            .filter(auth_token::Column::Key.eq(key))
            .find_also_related(user::Entity)
            .one(&state.db)
            .await?;

        match found {
            Some((token, Some(user))) => Ok(CurrentUser { user, token }),
            _ => Err(AppError::Unauthorized),
        }
    }
}

impl FromRequestParts<SharedState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        if token_key(parts).is_none() {
            return Ok(MaybeUser(None));
        }

        let CurrentUser { user, .. } = CurrentUser::from_request_parts(parts, state).await?;
        Ok(MaybeUser(Some(user)))
    }
}

fn token_key(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(TOKEN_SCHEME)
        .map(|key| key.trim().to_string())
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::validation("Не удалось обработать пароль"))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub async fn issue_token(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<auth_token::Model, DbErr> {
    let token = auth_token::ActiveModel {
        key: Set(Uuid::new_v4().simple().to_string()),
        user_id: Set(user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    token.insert(db).await
}
