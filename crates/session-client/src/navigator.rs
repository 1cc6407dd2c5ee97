//! Exit surface for an ended session
//!
//! When the session cannot be recovered the user must be sent to the
//! external authentication page with a full navigation. How that happens
//! depends on the host (open a browser, print a URL, emit a UI event), so the
//! client only calls through this trait.

use std::sync::Mutex;

use tracing::warn;

/// Performs the full navigation to the external login page.
///
/// Called at most once per failed refresh and once per logout. Must not
/// block: hosts that need async work should hand the URL off to a task.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

/// Navigator for headless hosts: records the redirect in the log only.
#[derive(Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, url: &str) {
        warn!(login_url = url, "session ended, re-authentication required");
    }
}

/// Navigator that remembers every target it was sent to.
///
/// Useful for hosts that poll for a pending redirect, and for tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// All navigation targets, oldest first.
    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.visited().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        self.visited
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(url.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_navigator_keeps_order() {
        let nav = RecordingNavigator::new();
        assert!(nav.last().is_none());
        nav.navigate("https://auth.example.com/login");
        nav.navigate("https://auth.example.com/login?again=1");
        assert_eq!(nav.visited().len(), 2);
        assert_eq!(
            nav.last().as_deref(),
            Some("https://auth.example.com/login?again=1")
        );
    }

    #[test]
    fn log_navigator_is_usable_as_trait_object() {
        let nav: std::sync::Arc<dyn Navigator> = std::sync::Arc::new(LogNavigator);
        nav.navigate("https://auth.example.com/login");
    }
}
