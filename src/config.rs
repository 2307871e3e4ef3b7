use std::env;
use std::net::SocketAddr;

use chrono::Duration;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub policy: PresencePolicy,
}

/// Time limits applied by the presence state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresencePolicy {
    /// How long a representative may edit or delete their own declaration.
    pub edit_window: Duration,
    /// How long a pending mobile declaration stays confirmable. `None`
    /// leaves it open until a representative answers.
    pub confirmation_window: Option<Duration>,
}

impl Default for PresencePolicy {
    fn default() -> Self {
        Self {
            edit_window: Duration::minutes(15),
            confirmation_window: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://presence.db?mode=rwc".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR: {}", e)))?;

        let db_max_connections = parse_var::<u32>("DB_MAX_CONNECTIONS")?.unwrap_or(5);

        let edit_window = parse_var::<i64>("EDIT_WINDOW_MINUTES")?.unwrap_or(15);
        if edit_window < 0 {
            return Err(AppError::Config("EDIT_WINDOW_MINUTES must not be negative".to_string()));
        }

        let confirmation_window = parse_var::<i64>("CONFIRMATION_WINDOW_MINUTES")?;
        if confirmation_window.is_some_and(|m| m < 0) {
            return Err(AppError::Config(
                "CONFIRMATION_WINDOW_MINUTES must not be negative".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            bind_addr,
            db_max_connections,
            policy: PresencePolicy {
                edit_window: Duration::minutes(edit_window),
                confirmation_window: confirmation_window.map(Duration::minutes),
            },
        })
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}
