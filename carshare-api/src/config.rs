//! Configuration loaded from environment variables
//!
//! # Environment Variables
//!
//! - `API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `API_PORT`: Port to bind to (default: 8080)
//! - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
//! - `PRODUCTION`: Enables HSTS (default: false)
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
//! - `JWT_SECRET`: Token signing secret, at least 32 characters (required)
//! - `RAPYD_ACCESS_KEY`, `RAPYD_SECRET_KEY`: Payment gateway keys (required)
//! - `RAPYD_BASE_URL`: Gateway base URL (default: the sandbox)
//! - `RUST_LOG`: Log filter (default: carshare_api=debug,tower_http=debug)
//!
//! A `.env` file in the working directory is loaded first if present.

use carshare_shared::payments::gateway::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub payments: PaymentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any origin
    pub cors_origins: Vec<String>,

    /// Production mode adds Strict-Transport-Security
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// At least 32 characters. Generate with `openssl rand -hex 32`.
    #[serde(skip_serializing)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    pub access_key: String,

    #[serde(skip_serializing)]
    pub secret_key: String,

    pub base_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };

        let port = get_or("API_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is invalid: {}", e))?;

        let cors_origins = get_or("CORS_ORIGINS", "*")
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        let production = matches!(
            get_or("PRODUCTION", "false").to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        );

        let max_connections = get_or("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        Ok(Self {
            api: ApiConfig {
                host: get_or("API_HOST", "0.0.0.0"),
                port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            payments: PaymentsConfig {
                access_key: required("RAPYD_ACCESS_KEY")?,
                secret_key: required("RAPYD_SECRET_KEY")?,
                base_url: get_or("RAPYD_BASE_URL", DEFAULT_BASE_URL),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgresql://localhost/carshare"),
        ("JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
        ("RAPYD_ACCESS_KEY", "ak_test"),
        ("RAPYD_SECRET_KEY", "sk_test"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(REQUIRED)).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.allows_any_origin());
        assert!(!config.api.production);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.payments.base_url, "https://sandboxapi.rapyd.net");
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "3000"),
            ("CORS_ORIGINS", "https://carshare.example, https://admin.carshare.example"),
            ("PRODUCTION", "true"),
        ]);

        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(
            config.api.cors_origins,
            vec!["https://carshare.example", "https://admin.carshare.example"]
        );
        assert!(!config.allows_any_origin());
        assert!(config.api.production);
    }

    #[test]
    fn test_missing_required() {
        for (missing, _) in REQUIRED {
            let pairs: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| k != missing).collect();
            let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(err.to_string().contains(missing), "{err}");
        }
    }

    #[test]
    fn test_short_jwt_secret() {
        let pairs: Vec<_> = REQUIRED
            .iter()
            .map(|&(k, v)| if k == "JWT_SECRET" { (k, "short") } else { (k, v) })
            .collect();

        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_serialization_hides_secrets() {
        let config = Config::from_lookup(lookup(REQUIRED)).unwrap();
        let json = serde_json::to_value(&config).unwrap();

        assert!(json["jwt"].get("secret").is_none());
        assert!(json["payments"].get("secret_key").is_none());
    }
}
