//! Server configuration, read once at startup.

use crate::auth::jwt::JwtConfig;

/// Runtime configuration for the API process.
///
/// Everything except the JWT secret falls back to a local-development
/// default when its environment variable is absent.
///
/// | Env var                | Default                    |
/// |------------------------|----------------------------|
/// | `HOST`                 | `0.0.0.0`                  |
/// | `PORT`                 | `3000`                     |
/// | `CORS_ORIGINS`         | `http://localhost:5173`    |
/// | `REQUEST_TIMEOUT_SECS` | `30`                       |
/// | `GEOCODER_URL`         | unset (geocoding disabled) |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer, comma-separated in the env var.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Base URL of the geocoding service. `None` disables the trigger.
    pub geocoder_url: Option<String>,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Read the full configuration from the environment.
    ///
    /// Panics on a malformed numeric value or a missing `JWT_SECRET`;
    /// both are deployment errors the process must not start with.
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_env("PORT", 3000),
            cors_origins: env_or("CORS_ORIGINS", "http://localhost:5173")
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30),
            geocoder_url: std::env::var("GEOCODER_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            jwt: JwtConfig::from_env(),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} is not a valid value: '{raw}'")),
        Err(_) => default,
    }
}
