use std::env;

use crate::error::{ConfigError, InvalidVarSnafu, MissingVarSnafu, NoStreamsSnafu};
use snafu::{OptionExt, ResultExt};

/// Immutable runtime configuration, resolved once at startup and shared
/// (cheaply, behind an `Arc`) with the supervisor and every ingestion
/// worker. Replaces the module-level globals of the original script.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_host: String,
    /// Line-protocol ingestion endpoint port.
    pub db_port: u16,
    /// SQL query endpoint port (schema bootstrap + front-contract marker).
    pub db_pg_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_database: String,

    pub batch_size: usize,
    pub parallel_workers: usize,
    pub sleep_duration_secs: u64,

    pub checkpoint_file: std::path::PathBuf,
    pub scid_files: Vec<std::path::PathBuf>,

    pub table_name: String,
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn parsed_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|_| InvalidVarSnafu { name, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables. `DB_HOST` is the
    /// only variable without a default; everything else degrades
    /// gracefully so a bare `scid-tailer tail` works against a local
    /// QuestDB instance.
    pub fn from_env() -> Result<Config, ConfigError> {
        let db_host = env::var("DB_HOST").ok().context(MissingVarSnafu {
            name: "DB_HOST",
        })?;

        let scid_files_raw = var_or("SCID_FILES", "");
        let scid_files: Vec<_> = scid_files_raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(std::path::PathBuf::from)
            .collect();
        if scid_files.is_empty() {
            return NoStreamsSnafu.fail();
        }

        Ok(Config {
            db_host,
            db_port: parsed_or("DB_PORT", 9000)?,
            db_pg_port: parsed_or("DB_PG_PORT", 8812)?,
            db_user: var_or("DB_USER", "admin"),
            db_password: var_or("DB_PASSWORD", "quest"),
            db_database: var_or("DB_DATABASE", "qdb"),

            batch_size: parsed_or("BATCH_SIZE", 200_000)?,
            parallel_workers: parsed_or("PARALLEL_WORKERS", 8)?,
            sleep_duration_secs: parsed_or("SLEEP_DURATION", 1000)?,

            checkpoint_file: std::path::PathBuf::from(var_or("CHECKPOINT_FILE", "checkpoint.json")),
            scid_files,

            table_name: var_or("SCID_TABLE_NAME", "trades"),
        })
    }

    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_pg_port, self.db_database
        )
    }
}
