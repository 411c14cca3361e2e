//! Accounts, authentication and subscriptions.

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::{hash_password, issue_token, verify_password, CurrentUser, MaybeUser},
    entities::{follow, recipe, user},
    error::AppError,
    handlers::recipes::CompactRecipe,
    pagination::{last_page, Page, PageQuery},
    SharedState,
};

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;

const AVATAR_DIR: &str = "users/avatars";

#[derive(Serialize)]
pub struct UserRead {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_subscribed: bool,
}

pub fn user_read(model: &user::Model, followed: &HashSet<i32>) -> UserRead {
    UserRead {
        id: model.id,
        email: model.email.clone(),
        username: model.username.clone(),
        first_name: model.first_name.clone(),
        last_name: model.last_name.clone(),
        avatar: model.avatar.clone(),
        is_subscribed: followed.contains(&model.id),
    }
}

/// Ids of every author the viewer follows; empty for anonymous viewers.
pub async fn followed_ids(
    db: &DatabaseConnection,
    viewer: Option<&user::Model>,
) -> Result<HashSet<i32>, DbErr> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };

    let follows = follow::Entity::find()
        .filter(follow::Column::FollowerId.eq(viewer.id))
        .all(db)
        .await?;

    Ok(follows.into_iter().map(|f| f.following_id).collect())
}

#[derive(Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
}

pub async fn register(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<UserRead>), AppError> {
    validate_registration(&payload)?;

    let duplicate = user::Entity::find()
        .filter(
            user::Column::Email
                .eq(&payload.email)
                .or(user::Column::Username.eq(&payload.username)),
        )
        .one(&state.db)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::validation(
            "Пользователь с таким email или username уже существует",
        ));
    }

    let created = user::ActiveModel {
        email: Set(payload.email),
        username: Set(payload.username),
        first_name: Set(payload.first_name),
        last_name: Set(payload.last_name),
        password_hash: Set(hash_password(&payload.password)?),
        avatar: Set(None),
        registered_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Registered user {}", created.username);

    Ok((
        StatusCode::CREATED,
        Json(user_read(&created, &HashSet::new())),
    ))
}

fn validate_registration(payload: &RegisterPayload) -> Result<(), AppError> {
    if payload.email.is_empty()
        || payload.email.len() > MAX_EMAIL_LEN
        || !payload.email.contains('@')
    {
        return Err(AppError::validation("Некорректный email"));
    }

    let username_ok = !payload.username.is_empty()
        && payload.username.len() <= MAX_NAME_LEN
        && payload
            .username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'));
    if !username_ok {
        return Err(AppError::validation(
            "Имя пользователя может содержать буквы, цифры и символы @/./+/-/_",
        ));
    }

    if payload.first_name.len() > MAX_NAME_LEN || payload.last_name.len() > MAX_NAME_LEN {
        return Err(AppError::validation("Слишком длинное имя"));
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "Пароль должен содержать не менее 8 символов",
        ));
    }

    Ok(())
}

pub async fn list(
    State(state): State<SharedState>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<UserRead>>, AppError> {
    let page = query.number();
    let limit = query.limit(state.config.page_size);

    let paginator = user::Entity::find()
        .order_by_desc(user::Column::RegisteredAt)
        .paginate(&state.db, limit);
    let count = paginator.num_items().await?;
    if page > last_page(count, limit) {
        return Err(AppError::PageNotFound);
    }
    let users = paginator.fetch_page(page - 1).await?;

    let followed = followed_ids(&state.db, viewer.as_ref()).await?;
    let results = users.iter().map(|u| user_read(u, &followed)).collect();

    Ok(Json(Page::assemble(results, count, page, limit)))
}

pub async fn retrieve(
    State(state): State<SharedState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i32>,
) -> Result<Json<UserRead>, AppError> {
    let found = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Пользователь"))?;

    let followed = followed_ids(&state.db, viewer.as_ref()).await?;

    Ok(Json(user_read(&found, &followed)))
}

pub async fn me(CurrentUser { user, .. }: CurrentUser) -> Json<UserRead> {
    Json(user_read(&user, &HashSet::new()))
}

#[derive(Deserialize)]
pub struct AvatarPayload {
    pub avatar: String,
}

pub async fn update_avatar(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Json(payload): Json<AvatarPayload>,
) -> Result<Json<Value>, AppError> {
    let path =
        super::media::save_base64_image(&state.config.media_root, AVATAR_DIR, &payload.avatar)
            .await?;

    let mut active: user::ActiveModel = user.into();
    active.avatar = Set(Some(path.clone()));
    active.update(&state.db).await?;

    Ok(Json(json!({ "avatar": path })))
}

pub async fn delete_avatar(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
) -> Result<StatusCode, AppError> {
    if let Some(old) = &user.avatar {
        // Removal failure only leaves a stale file behind.
        let _ = tokio::fs::remove_file(
            std::path::Path::new(&state.config.media_root).join(old),
        )
        .await;
    }

    let mut active: user::ActiveModel = user.into();
    active.avatar = Set(None);
    active.update(&state.db).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<Value>, AppError> {
    let found = user::Entity::find()
        .filter(user::Column::Email.eq(&payload.email))
        .one(&state.db)
        .await?;

    let Some(account) = found else {
        return Err(AppError::validation("Неверные учетные данные"));
    };

    if !verify_password(&payload.password, &account.password_hash) {
        return Err(AppError::validation("Неверные учетные данные"));
    }

    let token = issue_token(&state.db, account.id).await?;

    Ok(Json(json!({ "auth_token": token.key })))
}

pub async fn logout(
    State(state): State<SharedState>,
    CurrentUser { token, .. }: CurrentUser,
) -> Result<StatusCode, AppError> {
    token.delete(&state.db).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn subscribe(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<UserRead>), AppError> {
    let target = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Пользователь"))?;

    if target.id == user.id {
        return Err(AppError::validation("Нельзя подписаться на самого себя"));
    }

    let existing = follow::Entity::find()
        .filter(follow::Column::FollowerId.eq(user.id))
        .filter(follow::Column::FollowingId.eq(target.id))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "Вы уже подписаны на этого пользователя".to_string(),
        ));
    }

    follow::ActiveModel {
        follower_id: Set(user.id),
        following_id: Set(target.id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    let followed = HashSet::from([target.id]);

    Ok((StatusCode::CREATED, Json(user_read(&target, &followed))))
}

pub async fn unsubscribe(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    follow::Entity::delete_many()
        .filter(follow::Column::FollowerId.eq(user.id))
        .filter(follow::Column::FollowingId.eq(id))
        .exec(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct SubscribedAuthor {
    #[serde(flatten)]
    pub user: UserRead,
    pub recipes: Vec<CompactRecipe>,
    pub recipes_count: u64,
}

#[derive(Deserialize)]
pub struct SubscriptionsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub recipes_limit: Option<u64>,
}

pub async fn subscriptions(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<Page<SubscribedAuthor>>, AppError> {
    let recipes_limit = match query.recipes_limit {
        Some(0) => {
            return Err(AppError::validation(
                "recipes_limit должен быть положительным числом",
            ))
        }
        Some(limit) => limit as usize,
        None => usize::MAX,
    };

    let page_query = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let page = page_query.number();
    let limit = page_query.limit(state.config.page_size);

    let followed = followed_ids(&state.db, Some(&user)).await?;

    let paginator = user::Entity::find()
        .filter(user::Column::Id.is_in(followed.iter().copied()))
        .order_by_desc(user::Column::RegisteredAt)
        .paginate(&state.db, limit);
    let count = paginator.num_items().await?;
    if page > last_page(count, limit) {
        return Err(AppError::PageNotFound);
    }
    let authors = paginator.fetch_page(page - 1).await?;

    let author_ids: Vec<i32> = authors.iter().map(|a| a.id).collect();
    let all_recipes = recipe::Entity::find()
        .filter(recipe::Column::AuthorId.is_in(author_ids))
        .order_by_desc(recipe::Column::PublishedAt)
        .all(&state.db)
        .await?;

    let mut by_author: HashMap<i32, Vec<CompactRecipe>> = HashMap::new();
    for model in all_recipes {
        by_author
            .entry(model.author_id)
            .or_default()
            .push(CompactRecipe::from(model));
    }

    let results = authors
        .iter()
        .map(|author| {
            let mut recipes = by_author.remove(&author.id).unwrap_or_default();
            let recipes_count = recipes.len() as u64;
            recipes.truncate(recipes_limit);

            SubscribedAuthor {
                user: user_read(author, &followed),
                recipes,
                recipes_count,
            }
        })
        .collect();

    Ok(Json(Page::assemble(results, count, page, limit)))
}
