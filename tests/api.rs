//! HTTP-level tests driving the router end to end against a throwaway
//! SQLite database.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use recipehub::{
    config::Config,
    database::{init_database, sync_schema},
    entities::ingredient,
    routes::api_router,
    state::AppState,
    SharedState,
};

async fn test_state() -> SharedState {
    let dir = std::env::temp_dir().join(format!("recipehub-test-{}", Uuid::new_v4().simple()));
    std::fs::create_dir_all(&dir).unwrap();

    let database_url = format!("sqlite://{}?mode=rwc", dir.join("test.db").display());
    let db = init_database(&database_url).await.unwrap();
    sync_schema(&db).await.unwrap();

    let config = Config {
        port: 0,
        database_url,
        media_root: dir.join("media").display().to_string(),
        page_size: 6,
    };

    Arc::new(AppState { config, db })
}

async fn test_app() -> (Router, SharedState) {
    let state = test_state().await;
    (api_router().with_state(state.clone()), state)
}

fn request(
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register_and_login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/users/",
            Some(json!({
                "email": "anna@example.com",
                "username": "chef_anna",
                "first_name": "Анна",
                "password": "correct horse"
            })),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/token/login/",
            Some(json!({
                "email": "anna@example.com",
                "password": "correct horse"
            })),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    json_body(response).await["auth_token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn register_login_and_fetch_profile() {
    let (app, _state) = test_app().await;
    let token = register_and_login(&app).await;

    let response = app
        .clone()
        .oneshot(request("GET", "/api/users/me/", None, Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["username"], "chef_anna");
    assert_eq!(body["email"], "anna@example.com");
    assert_eq!(body["is_subscribed"], false);
}

#[tokio::test]
async fn profile_requires_token() {
    let (app, _state) = test_app().await;

    let response = app
        .clone()
        .oneshot(request("GET", "/api/users/me/", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ingredient_prefix_filter_is_case_insensitive() {
    let (app, state) = test_app().await;

    for (name, unit) in [("Sugar", "г"), ("salt", "г"), ("молоко", "мл")] {
        ingredient::ActiveModel {
            name: Set(name.to_string()),
            measurement_unit: Set(unit.to_string()),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap();
    }

    let response = app
        .clone()
        .oneshot(request("GET", "/api/ingredients/?name=Su", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Sugar"]);
}

#[tokio::test]
async fn cart_flow_produces_downloadable_report() {
    let (app, state) = test_app().await;
    let token = register_and_login(&app).await;

    let mut ingredient_ids = Vec::new();
    for (name, unit) in [("яйца", "шт"), ("мука", "г"), ("молоко", "мл")] {
        let created = ingredient::ActiveModel {
            name: Set(name.to_string()),
            measurement_unit: Set(unit.to_string()),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap();
        ingredient_ids.push(created.id);
    }

    let recipes = [
        json!({
            "name": "Омлет",
            "text": "Взбить и жарить",
            "cooking_time": 10,
            "image": "data:image/png;base64,iVBORw0KGgo=",
            "ingredients": [
                {"id": ingredient_ids[0], "amount": 2},
                {"id": ingredient_ids[1], "amount": 100}
            ]
        }),
        json!({
            "name": "Блины",
            "text": "Смешать и выпекать",
            "cooking_time": 30,
            "image": "data:image/png;base64,iVBORw0KGgo=",
            "ingredients": [
                {"id": ingredient_ids[0], "amount": 3},
                {"id": ingredient_ids[2], "amount": 200}
            ]
        }),
    ];

    let mut recipe_ids = Vec::new();
    for payload in recipes {
        let response = app
            .clone()
            .oneshot(request("POST", "/api/recipes/", Some(payload), Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        recipe_ids.push(json_body(response).await["id"].as_i64().unwrap());
    }

    for id in &recipe_ids {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/recipes/{id}/shopping_cart/"),
                None,
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // Re-adding the same recipe violates the one-entry-per-pair invariant.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/recipes/{}/shopping_cart/", recipe_ids[0]),
            None,
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/recipes/download_shopping_cart/",
            None,
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap(),
        "attachment; filename=\"grocery_list.txt\""
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = body.lines().collect();

    assert!(lines[0].starts_with("Список покупок ("));
    assert_eq!(
        &lines[1..],
        &[
            "Ингредиенты:",
            "1. Молоко (мл) — 200",
            "2. Мука (г) — 100",
            "3. Яйца (шт) — 5",
            "",
            "Источники рецептов:",
            "1. Блины",
            "2. Омлет",
        ]
    );
}

#[tokio::test]
async fn shopping_cart_download_requires_auth() {
    let (app, _state) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/recipes/download_shopping_cart/",
            None,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn subscribing_twice_is_a_conflict() {
    let (app, _state) = test_app().await;
    let token = register_and_login(&app).await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/users/",
            Some(json!({
                "email": "boris@example.com",
                "username": "chef_boris",
                "first_name": "Борис",
                "password": "correct horse"
            })),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let author_id = json_body(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/users/{author_id}/subscribe/"),
            None,
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/users/{author_id}/subscribe/"),
            None,
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn patch_updates_only_the_provided_fields() {
    let (app, state) = test_app().await;
    let token = register_and_login(&app).await;

    let flour = ingredient::ActiveModel {
        name: Set("мука".to_string()),
        measurement_unit: Set("г".to_string()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/recipes/",
            Some(json!({
                "name": "Хлеб",
                "text": "Замесить и выпекать",
                "cooking_time": 90,
                "image": "data:image/png;base64,iVBORw0KGgo=",
                "ingredients": [{"id": flour.id, "amount": 500}]
            })),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let recipe_id = json_body(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/api/recipes/{recipe_id}/"),
            Some(json!({"name": "Ржаной хлеб"})),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["name"], "Ржаной хлеб");
    assert_eq!(body["text"], "Замесить и выпекать");
    assert_eq!(body["cooking_time"], 90);
    assert_eq!(body["ingredients"][0]["amount"], 500);
}

#[tokio::test]
async fn page_past_the_end_is_not_found() {
    let (app, _state) = test_app().await;
    register_and_login(&app).await;

    let response = app
        .clone()
        .oneshot(request("GET", "/api/users/?page=99", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subscribing_to_yourself_is_rejected() {
    let (app, _state) = test_app().await;
    let token = register_and_login(&app).await;

    let me = app
        .clone()
        .oneshot(request("GET", "/api/users/me/", None, Some(&token)))
        .await
        .unwrap();
    let my_id = json_body(me).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/users/{my_id}/subscribe/"),
            None,
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
