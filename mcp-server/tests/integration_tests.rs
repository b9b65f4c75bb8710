use mcp_server::config::{Config, DatabaseConfig, LogFormat, LoggingConfig, ServerConfig, Transport};
use mcp_server::setup::{create_store, ensure_database_directory};
use std::env;
use std::sync::Mutex;
use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn config_with_path(path: String) -> Config {
    Config {
        database: DatabaseConfig {
            path,
            max_connections: 5,
            connection_timeout: 30,
        },
        server: ServerConfig {
            transport: Transport::Stdio,
            http_host: "127.0.0.1".to_string(),
            http_port: 3001,
            config_dir: None,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        },
    }
}

#[tokio::test]
async fn test_server_startup_with_sqlite() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let config = config_with_path(db_path.display().to_string());

    let store = create_store(&config).await;
    assert!(store.is_ok(), "Failed to create store: {:?}", store.err());
}

#[test]
fn test_configuration_loading() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.server.transport, Transport::Stdio);
    assert_eq!(config.server.http_port, 3001);
}

#[test]
fn test_environment_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    env::set_var("DATABASE_PATH", "sqlite://test_env.db");
    env::set_var("TRANSPORT", "http");
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::default().merge_with_env().unwrap();

    assert_eq!(config.database.path, "sqlite://test_env.db");
    assert_eq!(config.server.transport, Transport::Http);
    assert_eq!(config.logging.level, "debug");

    env::remove_var("DATABASE_PATH");
    env::remove_var("TRANSPORT");
    env::remove_var("LOG_LEVEL");
}

#[test]
fn test_default_database_path() {
    let config = Config::default();
    assert_eq!(config.database_url(), "data/items.db");
}

#[test]
fn test_database_directory_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("subdir").join("test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let result = ensure_database_directory(&database_url);
    assert!(result.is_ok());
    assert!(db_path.parent().unwrap().exists());
}

#[test]
fn test_config_validation_errors() {
    let mut config = Config::default();

    config.logging.level = "invalid".to_string();
    assert!(config.validate().is_err());

    config.logging.level = "info".to_string();
    config.database.path = String::new();
    assert!(config.validate().is_err());

    config.database.path = "data/items.db".to_string();
    config.server.transport = Transport::Http;
    config.server.http_port = 0;
    assert!(config.validate().is_err());

    config.server.http_port = 3001;
    config.database.max_connections = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_http_address_formatting() {
    let mut config = config_with_path("data/items.db".to_string());
    config.server.http_host = "0.0.0.0".to_string();
    config.server.http_port = 8080;

    assert_eq!(config.http_address(), "0.0.0.0:8080");
}

#[tokio::test]
async fn test_store_creation_with_migrations() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("migration_test.db");
    let config = config_with_path(db_path.display().to_string());

    let store = create_store(&config).await;
    assert!(store.is_ok());
    assert!(db_path.exists());
}

#[tokio::test]
async fn test_multiple_store_instances_over_same_file() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("multi_test.db");
    let config = config_with_path(db_path.display().to_string());

    let store1 = create_store(&config).await;
    let store2 = create_store(&config).await;

    assert!(store1.is_ok());
    assert!(store2.is_ok());
}
