use std::sync::Arc;

use sea_orm::DatabaseConnection;

use super::{
    config::Config,
    database::{init_database, sync_schema},
};

pub struct AppState {
    pub config: Config,
    pub db: DatabaseConnection,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let db = init_database(&config.database_url)
            .await
            .expect("Database misconfigured!");
        sync_schema(&db).await.expect("Schema creation failed!");

        Arc::new(Self { config, db })
    }
}
