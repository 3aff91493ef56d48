//! Connection configuration: address resolution, credentials and the knobs a `Session`
//! consults during `open()`.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono_tz::Tz;
use common::err::{Error, XResult};

/// Name of the environment variable that can supply a server CA certificate path when
/// [`ConnectConfig::tls_server_ca_cert_path`] is left unset.
pub const TLS_CA_CERT_ENV: &str = "MYSQLX_TLS_CA_CERT";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 33060;

/// Authentication mechanism preference. `Auto` walks PLAIN/MYSQL41/SHA256_MEMORY in the
/// order documented on [`crate::auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    Plain,
    Auto,
    Sha256Memory,
    Mysql41,
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMechanism::Plain => "PLAIN",
            AuthMechanism::Auto => "AUTO",
            AuthMechanism::Sha256Memory => "SHA256_MEMORY",
            AuthMechanism::Mysql41 => "MYSQL41",
        };
        f.write_str(name)
    }
}

/// Where the transport dials to. The two variants are mutually exclusive: a `ConnectConfig`
/// carries exactly one.
#[derive(Debug, Clone)]
pub enum Address {
    Tcp(String),
    Unix(PathBuf),
}

/// Immutable configuration for one [`crate::session::Session`]. Cloning drops the password
/// (see [`ConnectConfig::password`]).
#[derive(Clone)]
pub struct ConnectConfig {
    address: Address,
    username: String,
    password: Option<String>,
    schema: Option<String>,
    use_tls: bool,
    auth_mechanism: AuthMechanism,
    tls_server_ca_cert_path: Option<PathBuf>,
    time_zone_name: Option<String>,
}

impl ConnectConfig {
    /// Builds a config dialing `host:port` (missing host/port fall back to
    /// `127.0.0.1:33060`). Use [`ConnectConfig::new_unix`] for a Unix-domain socket.
    pub fn new(address: impl Into<String>) -> Self {
        ConnectConfig {
            address: Address::Tcp(normalize_tcp_address(&address.into())),
            username: String::new(),
            password: None,
            schema: None,
            use_tls: false,
            auth_mechanism: AuthMechanism::Auto,
            tls_server_ca_cert_path: None,
            time_zone_name: None,
        }
    }

    pub fn new_unix(path: impl Into<PathBuf>) -> Self {
        ConnectConfig {
            address: Address::Unix(path.into()),
            username: String::new(),
            password: None,
            schema: None,
            use_tls: false,
            auth_mechanism: AuthMechanism::Auto,
            tls_server_ca_cert_path: None,
            time_zone_name: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = Some(password.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_auth_mechanism(mut self, mechanism: AuthMechanism) -> Self {
        self.auth_mechanism = mechanism;
        self
    }

    pub fn with_tls_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_server_ca_cert_path = Some(path.into());
        self
    }

    pub fn with_time_zone(mut self, name: impl Into<String>) -> Self {
        self.time_zone_name = Some(name.into());
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Not exposed via `Debug`; held separately so a config accidentally logged doesn't
    /// leak it.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    pub fn auth_mechanism(&self) -> AuthMechanism {
        self.auth_mechanism
    }

    /// The CA cert path, falling back to the `MYSQLX_TLS_CA_CERT` environment variable
    /// when the field itself is unset.
    pub fn tls_server_ca_cert_path(&self) -> Option<PathBuf> {
        self.tls_server_ca_cert_path
            .clone()
            .or_else(|| env::var_os(TLS_CA_CERT_ENV).map(PathBuf::from))
    }

    /// Resolves the configured time zone, defaulting to UTC. Fails if an explicit name
    /// doesn't resolve to an IANA location.
    pub fn time_zone(&self) -> XResult<Tz> {
        match &self.time_zone_name {
            None => Ok(Tz::UTC),
            Some(name) => Tz::from_str(name)
                .map_err(|_| Error::argument(format!("unknown time zone: {name}"))),
        }
    }

    /// `host` portion used as TLS SNI / cert verification name; `None` for Unix sockets.
    pub fn tls_server_name(&self) -> Option<&str> {
        match &self.address {
            Address::Tcp(addr) => addr.rsplit_once(':').map(|(host, _)| host),
            Address::Unix(_) => None,
        }
    }

    pub fn validate(&self) -> XResult<()> {
        match &self.address {
            Address::Tcp(addr) if addr.is_empty() => {
                return Err(Error::argument("address must not be empty"))
            }
            Address::Unix(path) if path.as_os_str().is_empty() => {
                return Err(Error::argument("unix socket path must not be empty"))
            }
            _ => {}
        }
        self.time_zone()?;
        Ok(())
    }
}

impl fmt::Debug for ConnectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("schema", &self.schema)
            .field("use_tls", &self.use_tls)
            .field("auth_mechanism", &self.auth_mechanism)
            .field("tls_server_ca_cert_path", &self.tls_server_ca_cert_path)
            .field("time_zone_name", &self.time_zone_name)
            .finish()
    }
}

fn normalize_tcp_address(raw: &str) -> String {
    if raw.is_empty() {
        return format!("{DEFAULT_HOST}:{DEFAULT_PORT}");
    }
    match raw.rsplit_once(':') {
        None => format!("{raw}:{DEFAULT_PORT}"),
        Some((host, port)) => {
            let host = if host.is_empty() { DEFAULT_HOST } else { host };
            if port.is_empty() {
                format!("{host}:{DEFAULT_PORT}")
            } else {
                format!("{host}:{port}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_missing_host_and_port() {
        assert_eq!(normalize_tcp_address(""), "127.0.0.1:33060");
        assert_eq!(normalize_tcp_address("db.internal"), "db.internal:33060");
        assert_eq!(normalize_tcp_address("db.internal:3406"), "db.internal:3406");
    }

    #[test]
    fn debug_redacts_password() {
        let cfg = ConnectConfig::new("localhost:33060").with_credentials("root", "hunter2");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn default_time_zone_is_utc() {
        let cfg = ConnectConfig::new("localhost");
        assert_eq!(cfg.time_zone().unwrap(), Tz::UTC);
    }

    #[test]
    fn unknown_time_zone_is_rejected() {
        let cfg = ConnectConfig::new("localhost").with_time_zone("Not/AZone");
        assert!(cfg.validate().is_err());
    }
}
