//! FalkorDB connection settings.
//!
//! Settings come either from individual variables or from a Redis-style
//! connection string, `redis://[user][:password@][host][:port][/db]`. The
//! connection string wins when both are present.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GraphMemError, GraphMemResult};

pub const DEFAULT_FALKORDB_HOST: &str = "localhost";
pub const DEFAULT_FALKORDB_PORT: u16 = 6379;
/// Graph name used for database number 0.
pub const DEFAULT_GRAPH_NAME: &str = "default_db";

pub const ENV_FALKORDB_CONNECTION_STRING: &str = "FALKORDB_CONNECTION_STRING";
pub const ENV_FALKORDB_URL: &str = "FALKORDB_URL";
pub const ENV_FALKORDB_HOST: &str = "FALKORDB_HOST";
pub const ENV_FALKORDB_PORT: &str = "FALKORDB_PORT";
pub const ENV_FALKORDB_DATABASE: &str = "FALKORDB_DATABASE";
pub const ENV_FALKORDB_PASSWORD: &str = "FALKORDB_PASSWORD";

const FORMAT_HINT: &str = "Expected format: redis://[user][:password]@[host][:port][/db]";

static REDIS_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^redis://(?:(?:([^:/@]*):?([^@/]*)@)?([^:/@]+|:(?:\d+)?)?(?::(\d+))?)?(?:/(\d+))?$",
    )
    .expect("connection string pattern is valid")
});

/// FalkorDB connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FalkorDbConfig {
    pub host: String,
    pub port: u16,
    /// Database number; mapped to a graph name by [`FalkorDbConfig::graph_name`].
    pub database: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// The connection string these settings were parsed from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
}

impl Default for FalkorDbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FALKORDB_HOST.to_string(),
            port: DEFAULT_FALKORDB_PORT,
            database: 0,
            username: None,
            password: None,
            connection_string: None,
        }
    }
}

impl FalkorDbConfig {
    /// Load from the process environment.
    pub fn from_env() -> GraphMemResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// `FALKORDB_CONNECTION_STRING` (or `FALKORDB_URL`) takes precedence over
    /// the individual `FALKORDB_*` variables.
    pub fn from_lookup<F>(lookup: F) -> GraphMemResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let connection_string = lookup(ENV_FALKORDB_CONNECTION_STRING)
            .or_else(|| lookup(ENV_FALKORDB_URL))
            .filter(|s| !s.trim().is_empty());

        if let Some(conn) = connection_string {
            return Self::from_connection_string(&conn);
        }

        let mut config = Self::default();
        if let Some(host) = lookup(ENV_FALKORDB_HOST).filter(|h| !h.is_empty()) {
            config.host = host;
        }
        if let Some(port) = lookup(ENV_FALKORDB_PORT) {
            config.port = parse_port(&port)?;
        }
        if let Some(db) = lookup(ENV_FALKORDB_DATABASE) {
            config.database = parse_database(&db)?;
        }
        config.password = lookup(ENV_FALKORDB_PASSWORD).filter(|p| !p.is_empty());
        Ok(config)
    }

    /// Parse a Redis-style connection string.
    ///
    /// ```
    /// use graphmem_core::config::FalkorDbConfig;
    ///
    /// let config = FalkorDbConfig::from_connection_string("redis://:secret@db.local:6380/2").unwrap();
    /// assert_eq!(config.host, "db.local");
    /// assert_eq!(config.port, 6380);
    /// assert_eq!(config.database, 2);
    /// assert_eq!(config.password.as_deref(), Some("secret"));
    /// ```
    pub fn from_connection_string(connection_string: &str) -> GraphMemResult<Self> {
        let trimmed = connection_string.trim();
        if trimmed.is_empty() {
            return Err(GraphMemError::validation("Connection string cannot be empty"));
        }

        let scheme = trimmed.split("://").next().unwrap_or_default();
        if scheme != "redis" || !trimmed.contains("://") {
            return Err(GraphMemError::invalid_format(
                format!(
                    "Invalid connection string scheme: {}. Expected: redis",
                    scheme
                ),
                FORMAT_HINT,
            ));
        }

        if trimmed == "redis://" || !REDIS_URL_PATTERN.is_match(trimmed) {
            return Err(GraphMemError::invalid_format(
                format!("Invalid connection string format: {}", trimmed),
                FORMAT_HINT,
            ));
        }

        let parsed = url::Url::parse(trimmed).map_err(|e| {
            GraphMemError::invalid_format(
                format!("Invalid connection string format: {} ({})", trimmed, e),
                FORMAT_HINT,
            )
        })?;

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_FALKORDB_HOST)
            .to_string();
        let port = parsed.port().unwrap_or(DEFAULT_FALKORDB_PORT);

        let path = parsed.path().trim_start_matches('/');
        let database = if path.is_empty() {
            0
        } else {
            path.parse::<u32>().map_err(|_| {
                GraphMemError::validation(format!(
                    "Invalid database number in connection string: {}",
                    path
                ))
            })?
        };

        let username = Some(parsed.username().to_string()).filter(|u| !u.is_empty());
        let password = parsed.password().map(str::to_string).filter(|p| !p.is_empty());

        let config = Self {
            host,
            port,
            database,
            username,
            password,
            connection_string: Some(trimmed.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> GraphMemResult<()> {
        if self.port == 0 {
            return Err(out_of_range(format!(
                "Port must be between 1 and 65535, got: {}",
                self.port
            )));
        }
        if self.host.trim().is_empty() {
            return Err(GraphMemError::missing_field(
                "FALKORDB_HOST",
                "Set FALKORDB_HOST or FALKORDB_CONNECTION_STRING",
            ));
        }
        Ok(())
    }

    /// Graph name selected for this database number.
    pub fn graph_name(&self) -> String {
        if self.database == 0 {
            DEFAULT_GRAPH_NAME.to_string()
        } else {
            self.database.to_string()
        }
    }

    /// URL handed to the Redis client. The database number is not part of it:
    /// FalkorDB selects graphs by name, not by Redis database index.
    pub fn client_url(&self) -> String {
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!("{}:{}@", user, pass),
            (None, Some(pass)) => format!(":{}@", pass),
            (Some(user), None) => format!("{}@", user),
            (None, None) => String::new(),
        };
        format!("redis://{}{}:{}", auth, self.host, self.port)
    }

    /// Same as [`client_url`](Self::client_url) with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        match self.password {
            Some(_) => format!(
                "redis://{}:****@{}:{}",
                self.username.as_deref().unwrap_or_default(),
                self.host,
                self.port
            ),
            None => self.client_url(),
        }
    }
}

fn out_of_range(message: String) -> GraphMemError {
    GraphMemError::Validation {
        message,
        code: crate::error::ErrorCode::ValOutOfRange,
        details: Default::default(),
        suggestion: None,
    }
}

fn parse_port(raw: &str) -> GraphMemResult<u16> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| GraphMemError::validation(format!("Invalid port: {}", raw)))?;
    if !(1..=65535).contains(&value) {
        return Err(out_of_range(format!(
            "Port must be between 1 and 65535, got: {}",
            value
        )));
    }
    Ok(value as u16)
}

fn parse_database(raw: &str) -> GraphMemResult<u32> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| GraphMemError::validation(format!("Invalid database number: {}", raw)))?;
    if value < 0 {
        return Err(out_of_range(format!(
            "Database number must be non-negative, got: {}",
            value
        )));
    }
    u32::try_from(value)
        .map_err(|_| out_of_range(format!("Database number too large: {}", value)))
}
