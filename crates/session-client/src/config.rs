//! Client configuration
//!
//! Deserializable so a host application can embed it in its own TOML file
//! under a `[session]` table. Only `base_url` and `login_url` are required.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::constants::{LOGOUT_PATH, REFRESH_PATH, REFRESH_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Dashboard API origin, e.g. `https://fleet.example.com`.
    pub base_url: String,
    /// External authentication entry point. Full navigation target when the
    /// session cannot be recovered.
    pub login_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_refresh_path() -> String {
    REFRESH_PATH.to_string()
}

fn default_logout_path() -> String {
    LOGOUT_PATH.to_string()
}

fn default_refresh_timeout() -> u64 {
    REFRESH_TIMEOUT_SECS
}

fn default_request_timeout() -> u64 {
    REQUEST_TIMEOUT_SECS
}

impl ClientConfig {
    /// Config with default endpoint paths and timeouts.
    pub fn new(base_url: impl Into<String>, login_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_url: login_url.into(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            refresh_timeout_secs: default_refresh_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    /// Check URLs and timeouts before any request is made.
    pub fn validate(&self) -> Result<()> {
        parse_http_url("base_url", &self.base_url)?;
        parse_http_url("login_url", &self.login_url)?;

        if self.refresh_timeout_secs == 0 {
            return Err(Error::Config(
                "refresh_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        self.endpoint(&self.refresh_path)?;
        self.endpoint(&self.logout_path)?;
        Ok(())
    }

    /// Resolve a path (or absolute URL) against `base_url`.
    ///
    /// Paths are appended below any path prefix on the base, leading `/`
    /// included. Absolute URLs must share the base's origin so the access
    /// token is never sent anywhere else.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = parse_http_url("base_url", &self.base_url)?;
        let url = match Url::parse(path) {
            Ok(absolute) => absolute,
            Err(_) => {
                if !base.path().ends_with('/') {
                    let prefixed = format!("{}/", base.path());
                    base.set_path(&prefixed);
                }
                base.join(path.trim_start_matches('/')).map_err(|e| {
                    Error::InvalidRequest(format!("cannot resolve {path}: {e}"))
                })?
            }
        };

        if url.origin() != base.origin() {
            return Err(Error::InvalidRequest(format!(
                "{path} is outside the API origin {}",
                base.origin().ascii_serialization()
            )));
        }
        Ok(url)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_http_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| Error::Config(format!("{field} is not a valid URL ({value}): {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!(
            "{field} must use http:// or https://, got scheme {other}"
        ))),
    }
}
