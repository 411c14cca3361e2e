//! Shopping list download endpoint.
//!
//! Resolves the caller's cart against the recipe and ingredient tables,
//! hands the result to [`crate::shopping_list::aggregate`] and returns the
//! rendered report as an attachment.

use std::collections::HashMap;

use axum::{
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use chrono::Local;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

use crate::{
    auth::CurrentUser,
    entities::{cart_entry, ingredient, recipe, recipe_ingredient},
    error::AppError,
    shopping_list::{aggregate, CartRecipe, IngredientLine},
    SharedState,
};

const FILE_NAME: &str = "grocery_list.txt";

/// Fetches the user's cart entries with each recipe's resolved ingredient
/// lines. Two queries total; grouping happens in memory.
pub async fn load_cart(db: &DatabaseConnection, user_id: i32) -> Result<Vec<CartRecipe>, DbErr> {
    let entries = cart_entry::Entity::find()
        .filter(cart_entry::Column::UserId.eq(user_id))
        .find_also_related(recipe::Entity)
        .all(db)
        .await?;

    let recipe_ids: Vec<i32> = entries
        .iter()
        .filter_map(|(_, found)| found.as_ref().map(|r| r.id))
        .collect();

    let lines = recipe_ingredient::Entity::find()
        .filter(recipe_ingredient::Column::RecipeId.is_in(recipe_ids))
        .find_also_related(ingredient::Entity)
        .all(db)
        .await?;

    let mut lines_by_recipe: HashMap<i32, Vec<IngredientLine>> = HashMap::new();
    for (line, resolved) in lines {
        if let Some(item) = resolved {
            lines_by_recipe
                .entry(line.recipe_id)
                .or_default()
                .push(IngredientLine {
                    name: item.name,
                    unit: item.measurement_unit,
                    amount: line.amount,
                });
        }
    }

    Ok(entries
        .into_iter()
        .filter_map(|(_, found)| found)
        .map(|model| CartRecipe {
            lines: lines_by_recipe.get(&model.id).cloned().unwrap_or_default(),
            recipe_name: model.name,
        })
        .collect())
}

pub async fn download(
    State(state): State<SharedState>,
    CurrentUser { user, .. }: CurrentUser,
) -> Result<Response, AppError> {
    let cart = load_cart(&state.db, user.id).await?;
    let report = aggregate(cart);
    let body = report.render(Local::now().date_naive());

    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{FILE_NAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}
