//! Configuration manager for MicroMarket.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_ADDRESS: &str = "0.0.0.0:5000";
const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Hard cap on a listing page, whatever the file says.
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Public URL of current instance. Used as token issuer.
    pub url: String,
    /// Socket address the HTTP server binds.
    pub address: String,
    #[serde(skip_deserializing)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    /// In-memory store is used when missing.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Related to JsonWebToken configuration.
    #[serde(skip_serializing)]
    pub token: Token,
    /// Product listing and write rules.
    pub catalog: Catalog,
    /// Related to metrics and OTLP export.
    #[serde(skip_serializing)]
    pub telemetry: Telemetry,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_CRATE_NAME").to_owned(),
            url: "http://localhost:5000/".to_owned(),
            address: DEFAULT_ADDRESS.to_owned(),
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            postgres: None,
            argon2: None,
            token: Token::default(),
            catalog: Catalog::default(),
            telemetry: Telemetry::default(),
        }
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Json Web Token configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    /// HMAC secret. Falls back on `JWT_SECRET` environment variable.
    pub secret: Option<String>,
    /// Lifetime of a token, in seconds.
    pub expiration: u64,
    /// Update token audience.
    /// Default is `micromarket`.
    pub audience: Option<String>,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            secret: None,
            expiration: 60 * 60 * 24 * 30, // 30 days.
            audience: None,
        }
    }
}

/// Catalog listing configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    /// Page size used when the caller does not send one.
    pub default_page_size: u64,
    /// Largest page size a caller may request.
    pub max_page_size: u64,
    /// Only admins may create, update or delete products.
    pub admin_only_writes: bool,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            default_page_size: 12,
            max_page_size: MAX_PAGE_SIZE,
            admin_only_writes: true,
        }
    }
}

impl Catalog {
    /// Keep page sizes within `1..=MAX_PAGE_SIZE`, default below max.
    fn normalize(&mut self) {
        self.max_page_size = self.max_page_size.clamp(1, MAX_PAGE_SIZE);
        self.default_page_size = self.default_page_size.clamp(1, self.max_page_size);
    }
}

/// Telemetry configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// Expose Prometheus metrics on `/metrics`.
    pub metrics: bool,
    /// gRPC endpoint of an OTLP collector.
    pub otlp_endpoint: Option<String>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            metrics: true,
            otlp_endpoint: None,
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path: &Path = if self.path.is_file() {
            &self.path
        } else {
            Path::new(DEFAULT_CONFIG_PATH)
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Ok(Arc::new(self.error(err)));
                        },
                    };

                config.version = VERSION.to_owned();
                config.url = self.normalize_url(&config.url)?;
                config.catalog.normalize();

                Ok(Arc::new(config))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, path = %self.path.display(), "cannot read configuration file, using defaults");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml() {
        let config: Configuration = serde_yaml::from_str(
            "name: shop\nurl: shop.example\ncatalog:\n  max_page_size: 50\n",
        )
        .unwrap();

        assert_eq!(config.name, "shop");
        assert_eq!(config.catalog.max_page_size, 50);
        assert_eq!(config.catalog.default_page_size, 12);
        assert!(config.catalog.admin_only_writes);
        assert_eq!(config.token.expiration, 60 * 60 * 24 * 30);
        assert!(config.postgres.is_none());
    }

    #[test]
    fn test_page_size_is_capped() {
        let mut catalog = Catalog {
            default_page_size: 200,
            max_page_size: 500,
            admin_only_writes: true,
        };
        catalog.normalize();
        assert_eq!(catalog.max_page_size, MAX_PAGE_SIZE);
        assert_eq!(catalog.default_page_size, MAX_PAGE_SIZE);

        catalog.max_page_size = 0;
        catalog.default_page_size = 0;
        catalog.normalize();
        assert_eq!((catalog.max_page_size, catalog.default_page_size), (1, 1));
    }

    #[test]
    fn test_read_caps_page_size() {
        let path = std::env::temp_dir()
            .join(format!("micromarket-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "catalog:\n  max_page_size: 500\n  default_page_size: 20\n")
            .unwrap();

        let config = Configuration::default().path(path.clone()).read().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.catalog.max_page_size, MAX_PAGE_SIZE);
        assert_eq!(config.catalog.default_page_size, 20);
    }

    #[test]
    fn test_normalize_url() {
        let config = Configuration::default();
        assert_eq!(
            config.normalize_url("shop.example").unwrap(),
            "https://shop.example/"
        );
        assert_eq!(
            config.normalize_url("http://localhost:5000").unwrap(),
            "http://localhost:5000/"
        );
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Configuration::default()
            .path(PathBuf::from("does/not/exist.yaml"))
            .read()
            .unwrap();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.version(), VERSION);
    }
}
