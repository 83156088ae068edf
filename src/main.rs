#[macro_use]
extern crate rocket;

mod auth;
mod catalog;
mod database;
mod db;
mod env;
mod error;
mod models;
mod progress;
mod report;
mod routes;
mod skills_map;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;
mod views;

use std::str::FromStr;

use auth::{forbidden, not_found, unauthorized};
use catalog::ensure_catalog;
use database::ensure_schema;
use db::clean_expired_sessions;
use env::{Settings, load_environment};
use error::AppError;
use rocket::{Build, Rocket};
use routes::{admin, assessments, children, edit_requests, pages, reports};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::info;
use views::Views;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to load environment: {0}")]
    Env(#[from] dotenvy::Error),
    #[error("Failed to compile templates: {0}")]
    Templates(#[from] tera::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("{0}")]
    Rocket(#[from] Box<rocket::Error>),
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

async fn connect(database_url: &str) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    Ok(SqlitePoolOptions::new().connect_with(options).await?)
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let env_files = load_environment()?;
    init_tracing();
    info!(files = ?env_files, "Loaded environment files");

    let settings = Settings::from_env();
    let pool = connect(&settings.database_url).await?;

    info!("Checking database schema...");
    let report = ensure_schema(&pool).await?;
    if report.changed() {
        info!(
            tables = ?report.created_tables,
            columns = ?report.added_columns,
            indexes = ?report.created_indexes,
            "Database schema updated"
        );
    }

    let loaded = ensure_catalog(&pool, &settings.catalog_path).await;
    if loaded > 0 {
        info!(count = loaded, "Seeded skill catalog");
    }

    let purged = clean_expired_sessions(&pool).await?;
    if purged > 0 {
        info!("Cleaned up {} expired sessions", purged);
    }

    init_rocket(pool, settings)?.launch().await?;
    Ok(())
}

pub fn init_rocket(pool: SqlitePool, settings: Settings) -> Result<Rocket<Build>, Error> {
    info!("Starting ABLLS-R tracker");

    let views = Views::load()?;

    Ok(rocket::build()
        .manage(pool)
        .manage(views)
        .manage(settings)
        .mount(
            "/auth",
            routes![
                routes::auth::register_page,
                routes::auth::register,
                routes::auth::login_page,
                routes::auth::login,
                routes::auth::logout,
            ],
        )
        .mount(
            "/",
            routes![
                pages::index,
                pages::health,
                pages::dashboard,
                pages::knowledge_base,
                children::children_page,
                children::create_child_action,
                children::assign_therapist_action,
                children::assign_parent_action,
                assessments::assessments_page,
                assessments::record_assessment,
                edit_requests::requests_page,
                edit_requests::submit_request,
                edit_requests::review_page,
                edit_requests::decide_request,
                reports::reports_page,
                reports::skills_map_page,
                reports::export_report,
                reports::progress_page,
                admin::history,
                admin::users,
            ],
        )
        .register("/", catchers![unauthorized, forbidden, not_found])
        .attach(TelemetryFairing))
}
