use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Store file path. Relative paths are resolved against the current
    /// working directory; `SqliteStore::new` accepts it as-is.
    pub path: String,
    /// Maximum number of database connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// `stdio` or `http`
    pub transport: Transport,
    /// Bind host for the `http` transport
    pub http_host: String,
    /// Bind port for the `http` transport
    pub http_port: u16,
    /// Directory holding `.workflow/config.yaml` and `.workflow/schemas.yaml`.
    /// `None` means "use the current working directory".
    #[serde(default)]
    pub config_dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, json, compact)
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl Config {
    /// Load configuration from the bundled default, an optional config file,
    /// and environment variable overrides.
    pub fn from_env() -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        builder = builder.add_source(File::from_str(
            include_str!("../config/default.toml"),
            FileFormat::Toml,
        ));

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(
                File::with_name(&config_file)
                    .required(false)
                    .format(FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("MCP")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut result: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Self::apply_standard_env_vars(&mut result);

        Ok(result)
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .add_source(File::with_name(path).format(FileFormat::Toml))
            .add_source(
                Environment::with_prefix("MCP")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .context("Failed to build configuration from file")?;

        let mut result: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration from file")?;

        Self::apply_standard_env_vars(&mut result);

        Ok(result)
    }

    /// Apply the bare environment variables named in the external-interfaces
    /// contract (`DATABASE_PATH`, `TRANSPORT`, `HTTP_HOST`, `HTTP_PORT`,
    /// `CONFIG_DIR`, `LOG_LEVEL`), layered on top of the `MCP_`-prefixed ones.
    fn apply_standard_env_vars(config: &mut Config) {
        if let Ok(database_path) = env::var("DATABASE_PATH") {
            config.database.path = database_path;
        }
        if let Ok(max_conn) = env::var("DATABASE_MAX_CONNECTIONS") {
            if let Ok(max_conn) = max_conn.parse() {
                config.database.max_connections = max_conn;
            }
        }
        if let Ok(config_dir) = env::var("CONFIG_DIR") {
            config.server.config_dir = Some(config_dir);
        }
        if let Ok(transport) = env::var("TRANSPORT") {
            match transport.to_lowercase().as_str() {
                "stdio" => config.server.transport = Transport::Stdio,
                "http" => config.server.transport = Transport::Http,
                _ => {}
            }
        }
        if let Ok(http_host) = env::var("HTTP_HOST") {
            config.server.http_host = http_host;
        }
        if let Ok(http_port) = env::var("HTTP_PORT") {
            if let Ok(http_port) = http_port.parse() {
                config.server.http_port = http_port;
            }
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.logging.level = log_level;
        }
    }

    /// Merge current configuration with environment variables using config crate
    #[allow(dead_code)]
    pub fn merge_with_env(mut self) -> Result<Self> {
        Self::apply_standard_env_vars(&mut self);
        Ok(self)
    }

    /// Path handed to `SqliteStore::new` — a bare path, `:memory:`, or an
    /// already-prefixed `sqlite://` URL; the database crate normalizes it.
    pub fn database_url(&self) -> String {
        self.database.path.clone()
    }

    /// Resolve the directory holding `.workflow/config.yaml` and
    /// `.workflow/schemas.yaml`: `config_dir` if set, else the current
    /// working directory.
    pub fn config_dir(&self) -> PathBuf {
        match &self.server.config_dir {
            Some(dir) => PathBuf::from(dir),
            None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// HTTP bind address, used only when `transport` is `http`.
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.http_host, self.server.http_port)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ));
            }
        }

        if self.database.path.is_empty() {
            return Err(anyhow::anyhow!("Database path cannot be empty"));
        }

        if self.server.transport == Transport::Http && self.server.http_port == 0 {
            return Err(anyhow::anyhow!("HTTP port cannot be 0"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!(
                "Database max_connections must be greater than 0"
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "data/items.db".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            server: ServerConfig {
                transport: Transport::Stdio,
                http_host: "0.0.0.0".to_string(),
                http_port: 3001,
                config_dir: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.transport, Transport::Stdio);
        assert_eq!(config.server.http_port, 3001);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_database_url_default() {
        let config = Config::default();
        assert_eq!(config.database_url(), "data/items.db");
    }

    #[test]
    fn test_database_url_custom() {
        let mut config = Config::default();
        config.database.path = "sqlite:///tmp/custom.db".to_string();
        assert_eq!(config.database_url(), "sqlite:///tmp/custom.db");
    }

    #[test]
    fn test_http_address() {
        let config = Config::default();
        assert_eq!(config.http_address(), "0.0.0.0:3001");
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = Config::default();
        invalid_config.logging.level = "invalid".to_string();
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_environment_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("DATABASE_PATH", "sqlite://test.db");
        env::set_var("TRANSPORT", "http");
        let config = Config::default().merge_with_env().unwrap();
        assert_eq!(config.database.path, "sqlite://test.db");
        assert_eq!(config.server.transport, Transport::Http);
        env::remove_var("DATABASE_PATH");
        env::remove_var("TRANSPORT");
    }

    #[test]
    fn test_config_dir_defaults_to_cwd() {
        let config = Config::default();
        assert_eq!(config.config_dir(), env::current_dir().unwrap());
    }
}
