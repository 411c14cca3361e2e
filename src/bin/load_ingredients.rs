//! Bulk ingredient catalog import.
//!
//! Reads `data/ingredients.json` (or the path given as the first argument)
//! and inserts every `{"name", "measurement_unit"}` record that is not
//! already in the catalog.

use std::{env, path::PathBuf, process::ExitCode};

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use recipehub::{
    config::Config,
    database::{init_database, sync_schema},
    entities::ingredient,
};

#[derive(Deserialize)]
struct IngredientSeed {
    name: String,
    measurement_unit: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/ingredients.json"));

    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) => {
            error!("Файл не обнаружен: {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let seeds: Vec<IngredientSeed> = match serde_json::from_str(&raw) {
        Ok(seeds) => seeds,
        Err(e) => {
            error!("Ошибка обработки JSON: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = Config::load();
    let db = match init_database(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Не удалось подключиться к базе данных: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = sync_schema(&db).await {
        error!("Не удалось создать схему: {e}");
        return ExitCode::FAILURE;
    }

    let mut imported = 0usize;
    let mut skipped = 0usize;

    for seed in seeds {
        let existing = ingredient::Entity::find()
            .filter(ingredient::Column::Name.eq(&seed.name))
            .filter(ingredient::Column::MeasurementUnit.eq(&seed.measurement_unit))
            .one(&db)
            .await;

        match existing {
            Ok(Some(_)) => skipped += 1,
            Ok(None) => {
                let insert = ingredient::ActiveModel {
                    name: Set(seed.name),
                    measurement_unit: Set(seed.measurement_unit),
                    ..Default::default()
                }
                .insert(&db)
                .await;

                match insert {
                    Ok(_) => imported += 1,
                    Err(e) => {
                        error!("Ошибка импорта: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            Err(e) => {
                error!("Ошибка запроса: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    info!("Успешно импортировано {imported} записей, пропущено {skipped}.");

    ExitCode::SUCCESS
}
