//! Recipe CRUD plus the per-user bookmark actions (favorites, cart).

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TryIntoModel,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{CurrentUser, MaybeUser},
    entities::{cart_entry, favorite, ingredient, recipe, recipe_ingredient, user},
    error::AppError,
    handlers::{
        media::save_base64_image,
        users::{followed_ids, user_read, UserRead},
    },
    pagination::{last_page, Page, PageQuery},
    SharedState,
};

const MIN_AMOUNT: i32 = 1;
const MAX_AMOUNT: i32 = 10_000;
const MAX_NAME_LEN: usize = 256;

const IMAGE_DIR: &str = "recipes/images";

#[derive(Serialize)]
pub struct IngredientLineRead {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Serialize)]
pub struct RecipeRead {
    pub id: i32,
    pub name: String,
    pub text: String,
    pub image: String,
    pub author: UserRead,
    pub cooking_time: i32,
    pub ingredients: Vec<IngredientLineRead>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Short form used in favorites, cart responses and subscription lists.
#[derive(Serialize)]
pub struct CompactRecipe {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<recipe::Model> for CompactRecipe {
    fn from(model: recipe::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            image: model.image,
            cooking_time: model.cooking_time,
        }
    }
}

#[derive(Deserialize)]
pub struct IngredientLineWrite {
    pub id: i32,
    pub amount: i32,
}

#[derive(Deserialize)]
pub struct RecipeWrite {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: Option<String>,
    pub ingredients: Vec<IngredientLineWrite>,
}

#[derive(Deserialize)]
pub struct RecipeListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub author: Option<i32>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

fn flag(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("1") | Some("true") | Some("True"))
}

/// Resolves a page of recipe rows into full read DTOs with authors,
/// ingredient lines and the viewer's bookmark flags, preserving order.
async fn read_many(
    db: &DatabaseConnection,
    models: Vec<recipe::Model>,
    viewer: Option<&user::Model>,
) -> Result<Vec<RecipeRead>, AppError> {
    let recipe_ids: Vec<i32> = models.iter().map(|m| m.id).collect();

    let lines = recipe_ingredient::Entity::find()
        .filter(recipe_ingredient::Column::RecipeId.is_in(recipe_ids.clone()))
        .find_also_related(ingredient::Entity)
        .all(db)
        .await?;

    let mut lines_by_recipe: HashMap<i32, Vec<IngredientLineRead>> = HashMap::new();
    for (line, resolved) in lines {
        if let Some(item) = resolved {
            lines_by_recipe
                .entry(line.recipe_id)
                .or_default()
                .push(IngredientLineRead {
                    id: item.id,
                    name: item.name,
                    measurement_unit: item.measurement_unit,
                    amount: line.amount,
                });
        }
    }

    let author_ids: HashSet<i32> = models.iter().map(|m| m.author_id).collect();
    let authors: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(author_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let followed = followed_ids(db, viewer).await?;
    let (favorited, in_cart) = bookmark_sets(db, viewer, &recipe_ids).await?;

    let mut results = Vec::with_capacity(models.len());
    for model in models {
        let author = authors
            .get(&model.author_id)
            .ok_or(AppError::NotFound("Пользователь"))?;

        results.push(RecipeRead {
            id: model.id,
            name: model.name,
            text: model.text,
            image: model.image,
            author: user_read(author, &followed),
            cooking_time: model.cooking_time,
            ingredients: lines_by_recipe.remove(&model.id).unwrap_or_default(),
            is_favorited: favorited.contains(&model.id),
            is_in_shopping_cart: in_cart.contains(&model.id),
        });
    }

    Ok(results)
}

async fn bookmark_sets(
    db: &DatabaseConnection,
    viewer: Option<&user::Model>,
    recipe_ids: &[i32],
) -> Result<(HashSet<i32>, HashSet<i32>), AppError> {
    let Some(viewer) = viewer else {
        return Ok((HashSet::new(), HashSet::new()));
    };

    let favorited = favorite::Entity::find()
        .filter(favorite::Column::UserId.eq(viewer.id))
        .filter(favorite::Column::RecipeId.is_in(recipe_ids.to_vec()))
        .all(db)
        .await?
        .into_iter()
        .map(|f| f.recipe_id)
        .collect();

    let in_cart = cart_entry::Entity::find()
        .filter(cart_entry::Column::UserId.eq(viewer.id))
        .filter(cart_entry::Column::RecipeId.is_in(recipe_ids.to_vec()))
        .all(db)
        .await?
        .into_iter()
        .map(|e| e.recipe_id)
        .collect();

    Ok((favorited, in_cart))
}

pub async fn list(
    State(state): State<SharedState>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<RecipeListQuery>,
) -> Result<Json<Page<RecipeRead>>, AppError> {
    let page_query = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let page = page_query.number();
    let limit = page_query.limit(state.config.page_size);

    let mut find = recipe::Entity::find().order_by_desc(recipe::Column::PublishedAt);

    if let Some(author_id) = query.author {
        find = find.filter(recipe::Column::AuthorId.eq(author_id));
    }

    if let Some(viewer) = viewer.as_ref() {
        if flag(&query.is_favorited) {
            let ids = bookmarked_recipe_ids(&state.db, viewer.id, Bookmark::Favorite).await?;
            find = find.filter(recipe::Column::Id.is_in(ids));
        }
        if flag(&query.is_in_shopping_cart) {
            let ids = bookmarked_recipe_ids(&state.db, viewer.id, Bookmark::Cart).await?;
            find = find.filter(recipe::Column::Id.is_in(ids));
        }
    }

    let paginator = find.paginate(&state.db, limit);
    let count = paginator.num_items().await?;
    if page > last_page(count, limit) {
        return Err(AppError::PageNotFound);
    }
    let models = paginator.fetch_page(page - 1).await?;

    let results = read_many(&state.db, models, viewer.as_ref()).await?;

    Ok(Json(Page::assemble(results, count, page, limit)))
}

enum Bookmark {
    Favorite,
    Cart,
}

async fn bookmarked_recipe_ids(
    db: &DatabaseConnection,
    user_id: i32,
    kind: Bookmark,
) -> Result<Vec<i32>, AppError> {
    let ids = match kind {
        Bookmark::Favorite => favorite::Entity::find()
            .filter(favorite::Column::UserId.eq(user_id))
            .all(db)
            .await?
            .into_iter()
            .map(|f| f.recipe_id)
            .collect(),
        Bookmark::Cart => cart_entry::Entity::find()
            .filter(cart_entry::Column::UserId.eq(user_id))
            .all(db)
            .await?
            .into_iter()
            .map(|e| e.recipe_id)
            .collect(),
    };

    Ok(ids)
}

pub async fn retrieve(
    State(state): State<SharedState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i32>,
) -> Result<Json<RecipeRead>, AppError> {
    let model = recipe::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Рецепт"))?;

    let mut results = read_many(&state.db, vec![model], viewer.as_ref()).await?;

    Ok(Json(results.remove(0)))
}

pub async fn create(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Json(payload): Json<RecipeWrite>,
) -> Result<(StatusCode, Json<RecipeRead>), AppError> {
    validate_write(&payload)?;
    check_ingredients_exist(&state.db, &payload.ingredients).await?;

    let image = payload
        .image
        .as_deref()
        .ok_or_else(|| AppError::validation("Добавьте изображение рецепта"))?;
    let image_path = save_base64_image(&state.config.media_root, IMAGE_DIR, image).await?;

    let created = recipe::ActiveModel {
        name: Set(payload.name),
        text: Set(payload.text),
        image: Set(image_path),
        author_id: Set(user.id),
        cooking_time: Set(payload.cooking_time),
        published_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    save_lines(&state.db, created.id, &payload.ingredients).await?;

    let mut results = read_many(&state.db, vec![created], Some(&user)).await?;

    Ok((StatusCode::CREATED, Json(results.remove(0))))
}

pub async fn update(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<RecipeWrite>,
) -> Result<Json<RecipeRead>, AppError> {
    let existing = recipe::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Рецепт"))?;

    if existing.author_id != user.id {
        return Err(AppError::Forbidden);
    }

    validate_write(&payload)?;
    check_ingredients_exist(&state.db, &payload.ingredients).await?;

    let mut active: recipe::ActiveModel = existing.into();
    active.name = Set(payload.name.clone());
    active.text = Set(payload.text.clone());
    active.cooking_time = Set(payload.cooking_time);
    if let Some(image) = payload.image.as_deref() {
        let image_path = save_base64_image(&state.config.media_root, IMAGE_DIR, image).await?;
        active.image = Set(image_path);
    }
    let updated = active.update(&state.db).await?;

    recipe_ingredient::Entity::delete_many()
        .filter(recipe_ingredient::Column::RecipeId.eq(updated.id))
        .exec(&state.db)
        .await?;
    save_lines(&state.db, updated.id, &payload.ingredients).await?;

    let mut results = read_many(&state.db, vec![updated], Some(&user)).await?;

    Ok(Json(results.remove(0)))
}

/// Partial update payload: absent fields keep their stored values.
#[derive(Deserialize)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub ingredients: Option<Vec<IngredientLineWrite>>,
}

pub async fn partial_update(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<RecipePatch>,
) -> Result<Json<RecipeRead>, AppError> {
    let existing = recipe::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Рецепт"))?;

    if existing.author_id != user.id {
        return Err(AppError::Forbidden);
    }

    if let Some(name) = &payload.name {
        validate_name(name)?;
    }
    if let Some(text) = &payload.text {
        validate_text(text)?;
    }
    if let Some(cooking_time) = payload.cooking_time {
        validate_cooking_time(cooking_time)?;
    }
    if let Some(lines) = &payload.ingredients {
        validate_lines(lines)?;
        check_ingredients_exist(&state.db, lines).await?;
    }

    let mut active: recipe::ActiveModel = existing.into();
    let mut changed = false;
    if let Some(name) = payload.name {
        active.name = Set(name);
        changed = true;
    }
    if let Some(text) = payload.text {
        active.text = Set(text);
        changed = true;
    }
    if let Some(cooking_time) = payload.cooking_time {
        active.cooking_time = Set(cooking_time);
        changed = true;
    }
    if let Some(image) = payload.image.as_deref() {
        let image_path = save_base64_image(&state.config.media_root, IMAGE_DIR, image).await?;
        active.image = Set(image_path);
        changed = true;
    }

    // An update statement with no changed columns is not executable.
    let updated = if changed {
        active.update(&state.db).await?
    } else {
        active.try_into_model()?
    };

    if let Some(lines) = &payload.ingredients {
        recipe_ingredient::Entity::delete_many()
            .filter(recipe_ingredient::Column::RecipeId.eq(updated.id))
            .exec(&state.db)
            .await?;
        save_lines(&state.db, updated.id, lines).await?;
    }

    let mut results = read_many(&state.db, vec![updated], Some(&user)).await?;

    Ok(Json(results.remove(0)))
}

pub async fn destroy(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let existing = recipe::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Рецепт"))?;

    if existing.author_id != user.id {
        return Err(AppError::Forbidden);
    }

    existing.delete(&state.db).await?;

    Ok(StatusCode::NO_CONTENT)
}

fn validate_write(payload: &RecipeWrite) -> Result<(), AppError> {
    validate_name(&payload.name)?;
    validate_text(&payload.text)?;
    validate_cooking_time(payload.cooking_time)?;
    validate_lines(&payload.ingredients)
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() || name.len() > MAX_NAME_LEN {
        return Err(AppError::validation("Некорректное название рецепта"));
    }

    Ok(())
}

fn validate_text(text: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::validation("Добавьте текст рецепта"));
    }

    Ok(())
}

fn validate_cooking_time(cooking_time: i32) -> Result<(), AppError> {
    if cooking_time < 1 {
        return Err(AppError::validation(
            "Время готовки должно быть не меньше одной минуты",
        ));
    }

    Ok(())
}

fn validate_lines(lines: &[IngredientLineWrite]) -> Result<(), AppError> {
    if lines.is_empty() {
        return Err(AppError::validation("Добавьте хотя бы один ингредиент"));
    }

    let mut seen = HashSet::new();
    for line in lines {
        if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&line.amount) {
            return Err(AppError::validation(
                "Количество ингредиента должно быть от 1 до 10000",
            ));
        }
        if !seen.insert(line.id) {
            return Err(AppError::validation("Ингредиенты не должны повторяться"));
        }
    }

    Ok(())
}

async fn check_ingredients_exist(
    db: &DatabaseConnection,
    lines: &[IngredientLineWrite],
) -> Result<(), AppError> {
    let ids: Vec<i32> = lines.iter().map(|l| l.id).collect();

    let found = ingredient::Entity::find()
        .filter(ingredient::Column::Id.is_in(ids.clone()))
        .all(db)
        .await?;

    if found.len() != ids.len() {
        return Err(AppError::validation("Указан несуществующий ингредиент"));
    }

    Ok(())
}

async fn save_lines(
    db: &DatabaseConnection,
    recipe_id: i32,
    lines: &[IngredientLineWrite],
) -> Result<(), AppError> {
    let models = lines.iter().map(|line| recipe_ingredient::ActiveModel {
        recipe_id: Set(recipe_id),
        ingredient_id: Set(line.id),
        amount: Set(line.amount),
        ..Default::default()
    });

    recipe_ingredient::Entity::insert_many(models)
        .exec(db)
        .await?;

    Ok(())
}

pub async fn add_favorite(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<CompactRecipe>), AppError> {
    let model = recipe::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Рецепт"))?;

    let existing = favorite::Entity::find()
        .filter(favorite::Column::UserId.eq(user.id))
        .filter(favorite::Column::RecipeId.eq(model.id))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::validation("Рецепт уже добавлен"));
    }

    favorite::ActiveModel {
        user_id: Set(user.id),
        recipe_id: Set(model.id),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(model.into())))
}

pub async fn remove_favorite(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    favorite::Entity::delete_many()
        .filter(favorite::Column::UserId.eq(user.id))
        .filter(favorite::Column::RecipeId.eq(id))
        .exec(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_to_cart(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<CompactRecipe>), AppError> {
    let model = recipe::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Рецепт"))?;

    let existing = cart_entry::Entity::find()
        .filter(cart_entry::Column::UserId.eq(user.id))
        .filter(cart_entry::Column::RecipeId.eq(model.id))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::validation("Рецепт уже добавлен"));
    }

    cart_entry::ActiveModel {
        user_id: Set(user.id),
        recipe_id: Set(model.id),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(model.into())))
}

pub async fn remove_from_cart(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    cart_entry::Entity::delete_many()
        .filter(cart_entry::Column::UserId.eq(user.id))
        .filter(cart_entry::Column::RecipeId.eq(id))
        .exec(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
