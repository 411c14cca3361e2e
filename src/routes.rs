use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{
    handlers::{ingredients, recipes, shopping_cart, users},
    SharedState,
};

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/users/", get(users::list).post(users::register))
        .route("/api/users/me/", get(users::me))
        .route(
            "/api/users/me/avatar/",
            put(users::update_avatar).delete(users::delete_avatar),
        )
        .route("/api/users/subscriptions/", get(users::subscriptions))
        .route("/api/users/{id}/", get(users::retrieve))
        .route(
            "/api/users/{id}/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route("/api/auth/token/login/", post(users::login))
        .route("/api/auth/token/logout/", post(users::logout))
        .route("/api/ingredients/", get(ingredients::list))
        .route("/api/ingredients/{id}/", get(ingredients::retrieve))
        .route("/api/recipes/", get(recipes::list).post(recipes::create))
        .route(
            "/api/recipes/download_shopping_cart/",
            get(shopping_cart::download),
        )
        .route(
            "/api/recipes/{id}/",
            get(recipes::retrieve)
                .put(recipes::update)
                .patch(recipes::partial_update)
                .delete(recipes::destroy),
        )
        .route(
            "/api/recipes/{id}/favorite/",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/api/recipes/{id}/shopping_cart/",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
}
