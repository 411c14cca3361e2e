//! Read-only ingredient catalog.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::{entities::ingredient, error::AppError, SharedState};

#[derive(Serialize)]
pub struct IngredientRead {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

impl From<ingredient::Model> for IngredientRead {
    fn from(model: ingredient::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            measurement_unit: model.measurement_unit,
        }
    }
}

/// The frontend historically used three different parameter names for the
/// same prefix search; all are accepted.
#[derive(Debug, Default, Deserialize)]
pub struct IngredientFilter {
    pub name: Option<String>,
    pub query: Option<String>,
    pub search: Option<String>,
}

impl IngredientFilter {
    fn term(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.query.as_deref())
            .or(self.search.as_deref())
    }
}

pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<IngredientFilter>,
) -> Result<Json<Vec<IngredientRead>>, AppError> {
    let mut query = ingredient::Entity::find().order_by_asc(ingredient::Column::Name);

    if let Some(term) = filter.term() {
        // Case-insensitive prefix match, same semantics on every backend.
        let pattern = format!("{}%", escape_like(&term.to_lowercase()));
        query = query.filter(
            Expr::expr(Func::lower(Expr::col(ingredient::Column::Name)))
                .like(LikeExpr::new(pattern).escape('\\')),
        );
    }

    let ingredients = query.all(&state.db).await?;

    Ok(Json(
        ingredients.into_iter().map(IngredientRead::from).collect(),
    ))
}

/// Escapes LIKE wildcards so a search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());

    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    escaped
}

pub async fn retrieve(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
) -> Result<Json<IngredientRead>, AppError> {
    let found = ingredient::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Ингредиент"))?;

    Ok(Json(found.into()))
}
