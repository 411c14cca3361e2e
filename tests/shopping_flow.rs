//! Database-level tests for cart loading and shopping list aggregation,
//! running against a throwaway SQLite database with the schema created
//! from the entities.

use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, ModelTrait, Set};
use uuid::Uuid;

use recipehub::{
    database::{init_database, sync_schema},
    entities::{cart_entry, ingredient, recipe, recipe_ingredient, user},
    handlers::shopping_cart::load_cart,
    shopping_list::aggregate,
};

async fn test_db() -> DatabaseConnection {
    let dir = std::env::temp_dir().join(format!("recipehub-test-{}", Uuid::new_v4().simple()));
    std::fs::create_dir_all(&dir).unwrap();

    let url = format!("sqlite://{}?mode=rwc", dir.join("test.db").display());
    let db = init_database(&url).await.unwrap();
    sync_schema(&db).await.unwrap();

    db
}

async fn seed_user(db: &DatabaseConnection) -> user::Model {
    user::ActiveModel {
        email: Set("anna@example.com".to_string()),
        username: Set("chef_anna".to_string()),
        first_name: Set("Анна".to_string()),
        last_name: Set(String::new()),
        password_hash: Set("unused-in-this-test".to_string()),
        avatar: Set(None),
        registered_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

async fn seed_ingredient(db: &DatabaseConnection, name: &str, unit: &str) -> ingredient::Model {
    ingredient::ActiveModel {
        name: Set(name.to_string()),
        measurement_unit: Set(unit.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

async fn seed_recipe(db: &DatabaseConnection, author: &user::Model, name: &str) -> recipe::Model {
    recipe::ActiveModel {
        name: Set(name.to_string()),
        text: Set("Смешать и готовить".to_string()),
        image: Set("recipes/images/test.png".to_string()),
        author_id: Set(author.id),
        cooking_time: Set(20),
        published_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

async fn seed_line(
    db: &DatabaseConnection,
    recipe: &recipe::Model,
    item: &ingredient::Model,
    amount: i32,
) {
    recipe_ingredient::ActiveModel {
        recipe_id: Set(recipe.id),
        ingredient_id: Set(item.id),
        amount: Set(amount),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();
}

async fn seed_cart(db: &DatabaseConnection, owner: &user::Model, recipe: &recipe::Model) {
    cart_entry::ActiveModel {
        user_id: Set(owner.id),
        recipe_id: Set(recipe.id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();
}

#[tokio::test]
async fn merges_shared_ingredients_across_cart_recipes() {
    let db = test_db().await;
    let anna = seed_user(&db).await;

    let sugar = seed_ingredient(&db, "сахар", "г").await;
    let eggs = seed_ingredient(&db, "яйца", "шт").await;
    let milk = seed_ingredient(&db, "молоко", "мл").await;

    let pancakes = seed_recipe(&db, &anna, "Блины").await;
    seed_line(&db, &pancakes, &sugar, 50).await;
    seed_line(&db, &pancakes, &eggs, 3).await;
    seed_line(&db, &pancakes, &milk, 200).await;

    let omelette = seed_recipe(&db, &anna, "Омлет").await;
    seed_line(&db, &omelette, &sugar, 10).await;
    seed_line(&db, &omelette, &eggs, 2).await;

    seed_cart(&db, &anna, &pancakes).await;
    seed_cart(&db, &anna, &omelette).await;

    let cart = load_cart(&db, anna.id).await.unwrap();
    let report = aggregate(cart);

    let totals: Vec<_> = report.totals().collect();
    assert_eq!(
        totals,
        vec![
            ("молоко", "мл", 200),
            ("сахар", "г", 60),
            ("яйца", "шт", 5),
        ]
    );

    let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    assert_eq!(
        report.render(date),
        "Список покупок (2026-02-01):\n\
         Ингредиенты:\n\
         1. Молоко (мл) — 200\n\
         2. Сахар (г) — 60\n\
         3. Яйца (шт) — 5\n\
         \n\
         Источники рецептов:\n\
         1. Блины\n\
         2. Омлет"
    );
}

#[tokio::test]
async fn empty_cart_produces_headers_only() {
    let db = test_db().await;
    let anna = seed_user(&db).await;

    let cart = load_cart(&db, anna.id).await.unwrap();
    let report = aggregate(cart);

    let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    assert_eq!(
        report.render(date),
        "Список покупок (2026-02-01):\nИнгредиенты:\n\nИсточники рецептов:"
    );
}

#[tokio::test]
async fn cart_only_sees_its_own_user() {
    let db = test_db().await;
    let anna = seed_user(&db).await;

    let other = user::ActiveModel {
        email: Set("boris@example.com".to_string()),
        username: Set("boris".to_string()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password_hash: Set("unused-in-this-test".to_string()),
        avatar: Set(None),
        registered_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let salt = seed_ingredient(&db, "соль", "г").await;
    let soup = seed_recipe(&db, &anna, "Суп").await;
    seed_line(&db, &soup, &salt, 5).await;
    seed_cart(&db, &anna, &soup).await;

    let other_cart = load_cart(&db, other.id).await.unwrap();
    assert!(other_cart.is_empty());

    let anna_cart = load_cart(&db, anna.id).await.unwrap();
    assert_eq!(anna_cart.len(), 1);
}

#[tokio::test]
async fn deleting_a_recipe_drops_it_from_carts() {
    let db = test_db().await;
    let anna = seed_user(&db).await;

    let salt = seed_ingredient(&db, "соль", "г").await;
    let soup = seed_recipe(&db, &anna, "Суп").await;
    let stew = seed_recipe(&db, &anna, "Рагу").await;
    seed_line(&db, &soup, &salt, 5).await;
    seed_line(&db, &stew, &salt, 3).await;
    seed_cart(&db, &anna, &soup).await;
    seed_cart(&db, &anna, &stew).await;

    soup.delete(&db).await.unwrap();

    let cart = load_cart(&db, anna.id).await.unwrap();
    let report = aggregate(cart);

    assert_eq!(report.recipe_names().collect::<Vec<_>>(), vec!["Рагу"]);
    assert_eq!(report.totals().next(), Some(("соль", "г", 3)));
}
