use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    MissingVar(&'static str),
    #[error("ADMIN_SECRET_PATH must be a non-empty path segment")]
    InvalidAdminPath,
}

/// Service configuration, read once at startup. Secrets have no
/// fallback values; the process refuses to start without them.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub admin_username: String,
    pub admin_password: String,
    pub jwt_secret: String,
    /// Path segment the admin API hides under, without slashes.
    pub admin_secret_path: String,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require("DATABASE_URL")?;
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let admin_username =
            std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let admin_password = require("ADMIN_PASSWORD")?;
        let jwt_secret = require("JWT_SECRET")?;

        let admin_secret_path =
            std::env::var("ADMIN_SECRET_PATH").unwrap_or_else(|_| "admin".to_string());
        let admin_secret_path = admin_secret_path.trim_matches('/').to_string();
        if admin_secret_path.is_empty() {
            return Err(ConfigError::InvalidAdminPath);
        }

        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Config {
            database_url,
            bind_addr,
            admin_username,
            admin_password,
            jwt_secret,
            admin_secret_path,
            cookie_secure,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name))
}
