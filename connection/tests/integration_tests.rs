use std::fs;
use std::path::Path;

use common::log::tracing_factory::TracingFactory;
use connection::{AuthMechanism, ConnectConfig, Session};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TestConfig {
    mysqlx: MysqlxConfig,
    test: TestSettings,
}

#[derive(Debug, Deserialize)]
struct MysqlxConfig {
    host: String,
    port: u16,
    username: String,
    password: String,
    #[serde(default = "default_schema")]
    schema: String,
    #[serde(default)]
    use_tls: bool,
}

#[derive(Debug, Deserialize)]
struct TestSettings {
    enabled: bool,
    #[serde(default)]
    verbose: bool,
}

fn default_schema() -> String {
    "test".to_string()
}

/// Integration tests require a live mysqlx-enabled server.
///
/// 1. Copy `connection/tests/test-config.toml.example` to `connection/tests/test-config.toml`
/// 2. Fill in your server's host/port/credentials
/// 3. `cargo test --package connection --test integration_tests`
fn load_test_config() -> Option<TestConfig> {
    let config_path = Path::new("connection/tests/test-config.toml");
    if !config_path.exists() {
        return None;
    }
    match fs::read_to_string(config_path) {
        Ok(content) => match toml::from_str::<TestConfig>(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                println!("failed to parse {}: {e}", config_path.display());
                None
            }
        },
        Err(e) => {
            println!("failed to read {}: {e}", config_path.display());
            None
        }
    }
}

fn should_run() -> (bool, Option<TestConfig>) {
    match load_test_config() {
        Some(config) => (config.test.enabled, Some(config)),
        None => (false, None),
    }
}

fn connect_config(config: &TestConfig) -> ConnectConfig {
    ConnectConfig::new(format!("{}:{}", config.mysqlx.host, config.mysqlx.port))
        .with_credentials(config.mysqlx.username.clone(), config.mysqlx.password.clone())
        .with_schema(config.mysqlx.schema.clone())
        .with_tls(config.mysqlx.use_tls)
        .with_auth_mechanism(AuthMechanism::Auto)
}

#[test]
fn connect_and_probe_meta_info() {
    let (run, config) = should_run();
    if !run {
        println!("skipping: no connection/tests/test-config.toml with [test] enabled = true");
        return;
    }
    let config = config.unwrap();
    if config.test.verbose {
        TracingFactory::init_test_log();
    }

    let session = Session::open(&connect_config(&config)).expect("session open failed");
    assert!(!session.server_version().is_empty());
    assert!(session.connection_id() > 0);
}

#[test]
fn buffered_select_round_trip() {
    let (run, config) = should_run();
    if !run {
        println!("skipping: no connection/tests/test-config.toml with [test] enabled = true");
        return;
    }
    let config = config.unwrap();

    let mut session = Session::open(&connect_config(&config)).expect("session open failed");
    let result = session.execute("SELECT 1 + 1", &[]).expect("query failed");
    assert_eq!(result.columns.len(), 1);
    assert_eq!(result.rows.len(), 1);
    match result.rows[0].get(0) {
        Some(connection::Value::SInt(2)) => {}
        other => panic!("expected SInt(2), got {other:?}"),
    }
    session.close();
}

#[test]
fn streaming_cursor_drains_on_drop() {
    let (run, config) = should_run();
    if !run {
        println!("skipping: no connection/tests/test-config.toml with [test] enabled = true");
        return;
    }
    let config = config.unwrap();

    let mut session = Session::open(&connect_config(&config)).expect("session open failed");
    {
        let mut cursor = session
            .execute_streaming("SELECT 1 UNION SELECT 2 UNION SELECT 3", &[])
            .expect("query failed");
        let first = cursor.next().expect("expected a row").expect("row decode failed");
        assert!(first.get(0).is_some());
        // dropping here without reading the rest must not leave the session mid-result
    }
    let result = session.execute("SELECT 1", &[]).expect("session unusable after cursor drop");
    assert_eq!(result.rows.len(), 1);
}

#[test]
fn prepared_statement_round_trip() {
    let (run, config) = should_run();
    if !run {
        println!("skipping: no connection/tests/test-config.toml with [test] enabled = true");
        return;
    }
    let config = config.unwrap();

    let mut session = Session::open(&connect_config(&config)).expect("session open failed");
    let prepared = session.prepare("SELECT ? + ?").expect("prepare failed");
    let result = session
        .execute_prepared(&prepared, &[connection::Arg::SInt(1), connection::Arg::SInt(2)])
        .expect("execute_prepared failed");
    assert_eq!(result.rows.len(), 1);
    session.deallocate(prepared).expect("deallocate failed");
}

#[test]
fn bad_credentials_surface_as_server_error() {
    let (run, config) = should_run();
    if !run {
        println!("skipping: no connection/tests/test-config.toml with [test] enabled = true");
        return;
    }
    let config = config.unwrap();

    let bad = ConnectConfig::new(format!("{}:{}", config.mysqlx.host, config.mysqlx.port))
        .with_credentials(&config.mysqlx.username, "definitely-the-wrong-password")
        .with_auth_mechanism(AuthMechanism::Auto);
    let result = Session::open(&bad);
    assert!(result.is_err(), "expected authentication to fail with bad credentials");
}

#[test]
fn connect_to_nonexistent_host_fails_fast() {
    let config = ConnectConfig::new("nonexistent.invalid:33060")
        .with_credentials("root", "whatever")
        .with_auth_mechanism(AuthMechanism::Auto);
    let result = Session::open(&config);
    assert!(result.is_err(), "connecting to a nonexistent host should fail");
}

#[cfg(test)]
mod config_parsing {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let sample = r#"
[mysqlx]
host = "localhost"
port = 33060
username = "root"
password = "password"

[test]
enabled = false
"#;
        let config: TestConfig = toml::from_str(sample).expect("parse failed");
        assert_eq!(config.mysqlx.schema, "test");
        assert!(!config.mysqlx.use_tls);
        assert!(!config.test.enabled);
    }

    #[test]
    fn parses_full_config() {
        let sample = r#"
[mysqlx]
host = "db.internal"
port = 33070
username = "app"
password = "secret"
schema = "orders"
use_tls = true

[test]
enabled = true
verbose = true
"#;
        let config: TestConfig = toml::from_str(sample).expect("parse failed");
        assert_eq!(config.mysqlx.host, "db.internal");
        assert_eq!(config.mysqlx.schema, "orders");
        assert!(config.mysqlx.use_tls);
        assert!(config.test.verbose);
    }
}
