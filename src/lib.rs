//! Recipe-sharing backend.
//!
//! Users register, publish recipes built from a shared ingredient catalog,
//! follow other authors, mark recipes as favorites and collect recipes into
//! a shopping cart. The cart can be exported as a plain-text grocery list
//! with ingredient quantities summed across recipes.
//!
//! # General Infrastructure
//! - One stateless axum server in front of a relational database
//! - All state lives in the database; requests are independent and short-lived
//! - Token authentication: clients send `Authorization: Token <key>`
//! - Recipe and avatar images arrive base64-encoded and are written under
//!   the configured media root
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run against the `DATABASE_URL` from the environment.
//! ```sh
//! cargo run
//! ```
//!
//! Seed the ingredient catalog from `data/ingredients.json`.
//! ```sh
//! cargo run --bin load-ingredients
//! ```
use std::{sync::Arc, time::Duration};

use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod auth;
pub mod config;
pub mod database;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod routes;
pub mod shopping_list;
pub mod state;

use state::AppState;

/// Shared handle passed to every handler.
pub type SharedState = Arc<AppState>;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let app = routes::api_router().layer(cors).with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
