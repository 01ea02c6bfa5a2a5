/// Configuration management for the API server
///
/// Configuration comes from environment variables, with a `.env` file
/// loaded first when present.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `RUN_MIGRATIONS`: Apply embedded migrations at startup (default: true)
/// - `MEDIA_ROOT`: Directory for uploaded images (default: ./media)
/// - `MEDIA_URL`: URL prefix the images are served under (default: /media/)
/// - `MAX_UPLOAD_BYTES`: Request body limit (default: 10485760)
/// - `SESSION_TTL_HOURS`: Session lifetime, at most 87600 (default: 336)
/// - `SESSION_COOKIE_SECURE`: Mark the cookie `Secure` and send HSTS (default: false)
/// - `REJECT_DUPLICATE_TASKS`: Refuse a second task with the same title, day and time (default: false)
/// - `RUST_LOG`: Log filter; `LOG_FORMAT=json` switches to JSON logs
///
/// # Example
///
/// ```no_run
/// use dayplan_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Longest accepted session lifetime (ten years)
pub const MAX_SESSION_TTL_HOURS: u64 = 24 * 365 * 10;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub session: SessionConfig,
    pub tasks: TaskConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,

    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,

    /// Apply pending migrations before serving
    pub run_migrations: bool,
}

/// Uploaded media configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory renditions are written to
    pub root: String,

    /// Public URL prefix for `root`
    pub url: String,
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub ttl_hours: u64,

    /// Set `Secure` on the cookie; also enables HSTS
    pub cookie_secure: bool,
}

/// Task rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub reject_duplicates: bool,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` is missing
    /// - A numeric or boolean variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let ttl_hours: u64 = parse_var(&lookup, "SESSION_TTL_HOURS", 336)?;
        if ttl_hours == 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be greater than zero");
        }
        if ttl_hours > MAX_SESSION_TTL_HOURS {
            anyhow::bail!("SESSION_TTL_HOURS must be at most {}", MAX_SESSION_TTL_HOURS);
        }

        Ok(Self {
            api: ApiConfig {
                host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_var(&lookup, "API_PORT", 8080)?,
                cors_origins,
                max_upload_bytes: parse_var(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                run_migrations: parse_flag(&lookup, "RUN_MIGRATIONS", true)?,
            },
            media: MediaConfig {
                root: lookup("MEDIA_ROOT").unwrap_or_else(|| "./media".to_string()),
                url: lookup("MEDIA_URL").unwrap_or_else(|| "/media/".to_string()),
            },
            session: SessionConfig {
                ttl_hours,
                cookie_secure: parse_flag(&lookup, "SESSION_COOKIE_SECURE", false)?,
            },
            tasks: TaskConfig {
                reject_duplicates: parse_flag(&lookup, "REJECT_DUPLICATE_TASKS", false)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Path `/media/...` files are served from, derived from `MEDIA_URL`
    ///
    /// `None` when `MEDIA_URL` points at another host.
    pub fn media_mount_path(&self) -> Option<String> {
        let url = self.media.url.trim_end_matches('/');
        if url.starts_with('/') && url.len() > 1 {
            Some(url.to_string())
        } else {
            None
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{} must be a boolean, got {:?}", key, raw),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgresql://localhost/test")]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.api.max_upload_bytes, 10_485_760);
        assert_eq!(config.database.max_connections, 10);
        assert!(config.database.run_migrations);
        assert_eq!(config.media.root, "./media");
        assert_eq!(config.media.url, "/media/");
        assert_eq!(config.session.ttl(), Duration::from_secs(336 * 3600));
        assert!(!config.session.cookie_secure);
        assert!(!config.tasks.reject_duplicates);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("SESSION_COOKIE_SECURE", "true"),
            ("REJECT_DUPLICATE_TASKS", "1"),
            ("RUN_MIGRATIONS", "off"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(config.session.cookie_secure);
        assert!(config.tasks.reject_duplicates);
        assert!(!config.database.run_migrations);
    }

    #[test]
    fn test_database_url_is_required() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let base = ("DATABASE_URL", "postgresql://localhost/test");

        assert!(config_from(&[base, ("API_PORT", "eighty")]).is_err());
        assert!(config_from(&[base, ("MAX_UPLOAD_BYTES", "-1")]).is_err());
        assert!(config_from(&[base, ("SESSION_COOKIE_SECURE", "maybe")]).is_err());
        assert!(config_from(&[base, ("SESSION_TTL_HOURS", "0")]).is_err());
    }

    #[test]
    fn test_session_ttl_is_bounded() {
        let base = ("DATABASE_URL", "postgresql://localhost/test");

        assert!(config_from(&[base, ("SESSION_TTL_HOURS", "18446744073709551615")]).is_err());
        assert!(config_from(&[base, ("SESSION_TTL_HOURS", "87601")]).is_err());

        let config = config_from(&[base, ("SESSION_TTL_HOURS", "87600")]).unwrap();
        assert_eq!(
            config.session.ttl(),
            Duration::from_secs(MAX_SESSION_TTL_HOURS * 3600)
        );
    }

    #[test]
    fn test_media_mount_path() {
        let mut config = config_from(&[("DATABASE_URL", "postgresql://localhost/test")]).unwrap();
        assert_eq!(config.media_mount_path().as_deref(), Some("/media"));

        config.media.url = "https://cdn.example.com/media/".to_string();
        assert_eq!(config.media_mount_path(), None);
    }
}
