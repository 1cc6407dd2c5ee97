//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The signing secret is loaded from SESSION_JWT_SECRET or secret_file,
//! never stored in the TOML directly to avoid leaking it.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Env var holding the JWT signing secret. Wins over `session.secret_file`.
pub const SECRET_ENV: &str = "SESSION_JWT_SECRET";

/// HS256 keys shorter than this are rejected at startup.
pub const MIN_SECRET_LEN: usize = 32;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Session cookie and token settings
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Where the login callback sends the browser once the cookie is set.
    pub app_url: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub cookie_domain: Option<String>,
    #[serde(default = "default_secure")]
    pub secure: bool,
    #[serde(default = "default_cookie_max_age")]
    pub cookie_max_age_secs: u64,
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: u64,
    /// Path to a file containing the signing secret (alternative to SESSION_JWT_SECRET)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
}

/// Server-side session service notified on logout
#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub logout_url: Option<String>,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            logout_url: None,
            timeout_secs: default_upstream_timeout(),
        }
    }
}

fn default_max_connections() -> usize {
    1000
}

fn default_issuer() -> String {
    "fleet-session-gateway".to_string()
}

fn default_cookie_name() -> String {
    "refresh_token".to_string()
}

fn default_secure() -> bool {
    true
}

fn default_cookie_max_age() -> u64 {
    7 * 24 * 60 * 60
}

fn default_access_token_ttl() -> u64 {
    15 * 60
}

fn default_upstream_timeout() -> u64 {
    10
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order:
    /// 1. SESSION_JWT_SECRET env var
    /// 2. secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(secret) = std::env::var(SECRET_ENV) {
            config.session.secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.session.secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.session.secret = Some(Secret::new(secret));
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the gateway cannot serve with.
    pub fn validate(&self) -> common::Result<()> {
        require_http_url("app_url", &self.session.app_url)?;
        if let Some(ref url) = self.upstream.logout_url {
            require_http_url("logout_url", url)?;
        }

        if self.session.cookie_name.is_empty()
            || self
                .session
                .cookie_name
                .contains(|c: char| c.is_whitespace() || ";=,".contains(c))
        {
            return Err(common::Error::Config(format!(
                "cookie_name is not a valid cookie name: {:?}",
                self.session.cookie_name
            )));
        }

        for (field, value) in [
            ("cookie_max_age_secs", self.session.cookie_max_age_secs),
            ("access_token_ttl_secs", self.session.access_token_ttl_secs),
            ("timeout_secs", self.upstream.timeout_secs),
        ] {
            if value == 0 {
                return Err(common::Error::Config(format!(
                    "{field} must be greater than 0"
                )));
            }
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        match &self.session.secret {
            None => Err(common::Error::Config(format!(
                "no signing secret: set {SECRET_ENV} or session.secret_file"
            ))),
            Some(secret) if secret.expose().len() < MIN_SECRET_LEN => {
                Err(common::Error::Config(format!(
                    "signing secret must be at least {MIN_SECRET_LEN} bytes"
                )))
            }
            Some(_) => Ok(()),
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("fleet-session-gateway.toml")
    }
}

fn require_http_url(field: &str, value: &str) -> common::Result<()> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )));
    }
    Ok(())
}
