//! Session cookie encoding
//!
//! The refresh token lives only in an httpOnly cookie so page scripts can
//! never read it. Issuing and expiring use the same name, path and domain, or
//! browsers treat them as different cookies.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

use crate::config::SessionConfig;

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub max_age_secs: u64,
}

impl CookieSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            domain: config.cookie_domain.clone(),
            secure: config.secure,
            max_age_secs: config.cookie_max_age_secs,
        }
    }

    /// `Set-Cookie` value carrying the refresh token.
    pub fn session_cookie(&self, token: &str) -> String {
        self.render(token, self.max_age_secs)
    }

    /// `Set-Cookie` value that makes the browser drop the session cookie.
    pub fn expired_cookie(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax",
            self.name
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        cookie
    }

    /// Value of the session cookie from the request's `Cookie` headers.
    ///
    /// Empty values count as absent.
    pub fn read<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}
