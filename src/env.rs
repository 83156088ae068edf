use std::path::{Path, PathBuf};

use tracing::warn;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://ablls.db";
pub const DEFAULT_CATALOG_PATH: &str = "docs/WordTables_Combined.xlsx";
pub const DEFAULT_SESSION_HOURS: i64 = 12;

/// Loads the layered env files for the active Rocket profile. Later files
/// override earlier ones; missing files are skipped. Returns the files read.
pub fn load_environment() -> Result<Vec<&'static str>, dotenvy::Error> {
    let is_production =
        std::env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string())
            == "production";

    let env_files = if is_production {
        ["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        ["config/common.env", "config/dev.env", ".secrets.env"]
    };

    let mut loaded = Vec::new();
    for env_file in env_files {
        if load_env_file(env_file)? {
            loaded.push(env_file);
        }
    }
    Ok(loaded)
}

fn load_env_file(path: &str) -> Result<bool, dotenvy::Error> {
    if !Path::new(path).exists() {
        return Ok(false);
    }
    dotenvy::from_filename_override(path)?;
    Ok(true)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub catalog_path: PathBuf,
    pub report_font: Option<String>,
    pub session_hours: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            report_font: None,
            session_hours: DEFAULT_SESSION_HOURS,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let session_hours = match non_empty_var("SESSION_HOURS") {
            None => defaults.session_hours,
            Some(raw) => match raw.parse::<i64>() {
                Ok(hours) if hours > 0 => hours,
                _ => {
                    warn!(value = %raw, "Ignoring invalid SESSION_HOURS");
                    defaults.session_hours
                }
            },
        };

        Self {
            database_url: non_empty_var("DATABASE_URL").unwrap_or(defaults.database_url),
            catalog_path: non_empty_var("ABLLS_CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_path),
            report_font: non_empty_var("ABLLS_REPORT_FONT"),
            session_hours,
        }
    }
}
