//! Declarative job-type catalog loading, with `${VAR}` environment
//! substitution, plus the rest of the process-wide configuration
//! (server bind address, database DSN pieces, controller tunables).

use crate::model::JobTypeSpec;
use crate::Error;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

static VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Substitute `${VAR}` occurrences with process environment values.
/// Unresolved variables resolve to the empty string.
pub fn expand_env(input: &str) -> String {
    VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

/// On-disk shape of the catalog file: `{"jobs": {"<type_id>": {...}}}`.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    jobs: HashMap<String, CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    queue: String,
    image: String,
    threshold: u32,
    #[serde(default)]
    pull_secret: Option<String>,
}

/// The declarative job-type catalog: `type_id -> JobTypeSpec`. Immutable
/// once loaded at startup. An empty catalog is valid and yields a
/// quiescent controller.
#[derive(Debug, Clone, Default)]
pub struct JobCatalog {
    entries: HashMap<String, JobTypeSpec>,
}

impl JobCatalog {
    /// Parse a catalog from its JSON text, expanding `${VAR}` first.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let expanded = expand_env(raw);
        let file: CatalogFile = serde_json::from_str(&expanded)
            .map_err(|e| Error::config(format!("failed to parse job catalog: {e}")))?;

        let mut entries = HashMap::with_capacity(file.jobs.len());
        for (type_id, entry) in file.jobs {
            if entry.queue.is_empty() || entry.image.is_empty() {
                return Err(Error::config(format!(
                    "job type '{type_id}' is missing a required field (queue/image)"
                )));
            }
            entries.insert(
                type_id.clone(),
                JobTypeSpec {
                    type_id,
                    queue: entry.queue,
                    image: entry.image,
                    threshold: entry.threshold,
                    pull_secret: entry.pull_secret,
                },
            );
        }
        Ok(Self { entries })
    }

    /// Load and parse a catalog from a file on disk.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read catalog {}: {e}", path.display())))?;
        Self::parse(&content)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries sorted by `type_id`, for deterministic iteration across ticks.
    pub fn sorted(&self) -> Vec<&JobTypeSpec> {
        let mut v: Vec<&JobTypeSpec> = self.entries.values().collect();
        v.sort_by(|a, b| a.type_id.cmp(&b.type_id));
        v
    }

    pub fn get(&self, type_id: &str) -> Option<&JobTypeSpec> {
        self.entries.get(type_id)
    }
}

/// Process-wide configuration, assembled from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub logs: LogsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            broker: BrokerConfig::default(),
            controller: ControllerConfig::default(),
            logs: LogsConfig::default(),
        }
    }
}

impl Config {
    /// Assemble configuration from environment variables. Unlike the
    /// job catalog (which is fatal-on-parse-error), missing env vars
    /// fall back to documented defaults.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| default_host()),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_port),
            },
            database: DatabaseConfig::from_env(),
            broker: BrokerConfig {
                host: std::env::var("BROKER_HOST").unwrap_or_else(|_| "rabbitmq".to_string()),
                management_port: std::env::var("BROKER_MGMT_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(15672),
                username: std::env::var("BROKER_USERNAME").unwrap_or_else(|_| "guest".to_string()),
                password: std::env::var("BROKER_PASSWORD").unwrap_or_else(|_| "guest".to_string()),
            },
            controller: ControllerConfig {
                namespace: std::env::var("NAMESPACE").unwrap_or_else(|_| "default".to_string()),
                max_jobs: std::env::var("MAX_JOBS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3),
                catalog_path: std::env::var("JOB_CATALOG_PATH")
                    .unwrap_or_else(|_| "/app/config/jobs.config.json".to_string()),
                service_name: std::env::var("SERVICE_NAME").unwrap_or_else(|_| "jobscaler".to_string()),
            },
            logs: LogsConfig::default(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "postgres".to_string(),
            port: 5432,
            database: "job_platform".to_string(),
            username: "user".to_string(),
            password: "password".to_string(),
            pool_size: 5,
        }
    }
}

impl DatabaseConfig {
    fn from_env() -> Self {
        let default = Self::default();
        Self {
            host: std::env::var("DB_HOST").unwrap_or(default.host),
            port: std::env::var("DB_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
            database: std::env::var("DB_NAME").unwrap_or(default.database),
            username: std::env::var("DB_USER").unwrap_or(default.username),
            password: std::env::var("DB_PASSWORD").unwrap_or(default.password),
            pool_size: std::env::var("DB_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.pool_size),
        }
    }

    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    pub management_port: u16,
    pub username: String,
    pub password: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "rabbitmq".to_string(),
            management_port: 15672,
            username: "guest".to_string(),
            password: "guest".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub namespace: String,
    pub max_jobs: i32,
    pub catalog_path: String,
    /// In-cluster service name workers use to reach this controller's
    /// `/report` endpoint - distinct from `server.host`, which is a bind
    /// address (`0.0.0.0` by default) and not itself routable.
    pub service_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            max_jobs: 3,
            catalog_path: "/app/config/jobs.config.json".to_string(),
            service_name: "jobscaler".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_logs_root")]
    pub root: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            root: default_logs_root(),
        }
    }
}

fn default_logs_root() -> String {
    "/logs".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_vars() {
        std::env::set_var("JOBSCALER_TEST_VAR", "worker:v2");
        let out = expand_env(r#"{"image": "${JOBSCALER_TEST_VAR}"}"#);
        assert_eq!(out, r#"{"image": "worker:v2"}"#);
    }

    #[test]
    fn unresolved_var_becomes_empty() {
        std::env::remove_var("JOBSCALER_DEFINITELY_UNSET");
        let out = expand_env("${JOBSCALER_DEFINITELY_UNSET}x");
        assert_eq!(out, "x");
    }

    #[test]
    fn empty_catalog_is_valid() {
        let catalog = JobCatalog::parse(r#"{"jobs": {}}"#).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn parses_multiple_entries() {
        let catalog = JobCatalog::parse(
            r#"{"jobs": {
                "spend-analysis": {"queue": "spend_q", "image": "worker:1", "threshold": 20},
                "transactions": {"queue": "trans_q", "image": "worker:2", "threshold": 10, "pull_secret": "ghcr"}
            }}"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        let spend = catalog.get("spend-analysis").unwrap();
        assert_eq!(spend.threshold, 20);
        assert!(spend.pull_secret.is_none());
        let trans = catalog.get("transactions").unwrap();
        assert_eq!(trans.pull_secret.as_deref(), Some("ghcr"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = JobCatalog::parse(r#"{"jobs": {"bad": {"queue": "", "image": "w", "threshold": 1}}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn malformed_json_fails_loudly() {
        let err = JobCatalog::parse("not json");
        assert!(err.is_err());
    }
}
