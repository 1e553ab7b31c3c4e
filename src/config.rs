//! Startup configuration, resolved once from the environment.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_TARGET_BASE_URL: &str = "http://127.0.0.1:9000";
pub const DEFAULT_PROXY_PORT: u16 = 9007;
pub const DEFAULT_USERNAME: &str = "admin";

/// The single upstream origin every request is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    /// Parses an origin such as `http://127.0.0.1:9000`.
    ///
    /// A URL without an explicit port falls back to the scheme's default.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(value).map_err(|source| ConfigError::InvalidTargetUrl {
            value: value.to_string(),
            source,
        })?;

        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::MissingHost(value.to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ConfigError::MissingPort(value.to_string()))?;

        Ok(Self { host, port })
    }

    /// `host:port`, suitable for `TcpStream::connect` and the `Host` header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Basic-Auth credentials. Injection is active only when a password is set.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            // An empty password behaves like an unset one
            password: password.filter(|p| !p.is_empty()),
        }
    }

    pub fn injection_enabled(&self) -> bool {
        self.password.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target: Target,
    pub proxy_port: u16,
    pub credentials: Credentials,
}

impl Config {
    /// Reads `TARGET_BASE_URL`, `PROXY_PORT`, `JENKINS_USERNAME` and
    /// `JENKINS_PASSWORD` from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let target_url =
            lookup("TARGET_BASE_URL").unwrap_or_else(|| DEFAULT_TARGET_BASE_URL.to_string());
        let target = Target::parse(&target_url)?;

        let proxy_port = match lookup("PROXY_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PROXY_PORT,
        };

        let username =
            lookup("JENKINS_USERNAME").unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        let credentials = Credentials::new(username, lookup("JENKINS_PASSWORD"));

        Ok(Self {
            target,
            proxy_port,
            credentials,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.proxy_port))
    }

    /// The startup banner. Mentions whether credentials are injected, never
    /// the credentials themselves.
    pub fn describe(&self, listen_addr: SocketAddr) -> String {
        let auth_info = if self.credentials.injection_enabled() {
            ""
        } else {
            " without"
        };
        format!(
            "Proxying {} on {}{} injecting basic auth credentials",
            self.target.authority(),
            listen_addr,
            auth_info
        )
    }
}
