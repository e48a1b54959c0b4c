use std::{env, net::SocketAddr, str::FromStr};

use anyhow::{Context, Result};

use crate::models::CycleDefaults;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string; without it the service keeps data in memory.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub port: u16,
    pub defaults: CycleDefaults,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        let defaults = CycleDefaults {
            average_length: parse_var("DEFAULT_CYCLE_LENGTH", 28)?,
            period_length: parse_var("DEFAULT_PERIOD_LENGTH", 5)?,
        };
        defaults.validate().context("invalid DEFAULT_CYCLE_LENGTH or DEFAULT_PERIOD_LENGTH")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            max_connections: parse_var("DB_MAX_CONNECTIONS", 5)?,
            port: parse_var("PORT", 3050)?,
            defaults,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
