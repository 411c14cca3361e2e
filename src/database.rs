//! # Database
//!
//! Relational store behind the API.
//!
//! Core purpose is to hold users, the ingredient catalog, recipes with
//! their ingredient lines, and the per-user bookmark tables (favorites,
//! cart entries, follows).
//!
//! ## Requirements
//!
//! - Postgres in production, in-memory SQLite under test
//! - Schema derived from the entity definitions at startup
//! - Composite unique indexes backing the pair invariants:
//!   one catalog row per (name, unit), one bookmark per (user, recipe),
//!   one follow per (follower, following), one line per (recipe, ingredient)
use std::time::Duration;

use sea_orm::{
    sea_query::{Index, IndexCreateStatement},
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};

use crate::entities::{
    auth_token, cart_entry, favorite, follow, ingredient, recipe, recipe_ingredient, user,
};

pub async fn init_database(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(16)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    Database::connect(options).await
}

/// Creates every table and unique index that does not exist yet.
///
/// Tables are created in dependency order so foreign keys always point at
/// an existing table.
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, user::Entity).await?;
    create_table(db, auth_token::Entity).await?;
    create_table(db, follow::Entity).await?;
    create_table(db, ingredient::Entity).await?;
    create_table(db, recipe::Entity).await?;
    create_table(db, recipe_ingredient::Entity).await?;
    create_table(db, favorite::Entity).await?;
    create_table(db, cart_entry::Entity).await?;

    let indexes = [
        Index::create()
            .name("ingredient_name_unit_unique")
            .table(ingredient::Entity)
            .col(ingredient::Column::Name)
            .col(ingredient::Column::MeasurementUnit)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("recipe_ingredient_unique")
            .table(recipe_ingredient::Entity)
            .col(recipe_ingredient::Column::RecipeId)
            .col(recipe_ingredient::Column::IngredientId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("user_favorite_recipe_unique")
            .table(favorite::Entity)
            .col(favorite::Column::UserId)
            .col(favorite::Column::RecipeId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("user_cart_recipe_unique")
            .table(cart_entry::Entity)
            .col(cart_entry::Column::UserId)
            .col(cart_entry::Column::RecipeId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("follower_following_unique")
            .table(follow::Entity)
            .col(follow::Column::FollowerId)
            .col(follow::Column::FollowingId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ];

    for index in indexes {
        create_index(db, index).await?;
    }

    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();

    db.execute(backend.build(&statement)).await?;

    Ok(())
}

async fn create_index(db: &DatabaseConnection, index: IndexCreateStatement) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    db.execute(backend.build(&index)).await?;

    Ok(())
}
