//! Session client for the fleet dashboard API
//!
//! Keeps the short-lived access token in memory, attaches it to every API
//! call, and transparently renews it from the httpOnly session cookie when the
//! API answers 401. The long-lived refresh credential never leaves the cookie
//! jar.
//!
//! Request flow:
//! 1. `client::SessionClient::send()` attaches `Authorization: Bearer <token>`
//! 2. On 401, `coordinator::RefreshCoordinator::refresh()` runs (or joins) the
//!    single in-flight exchange against `/api/auth/refresh`
//! 3. The new token lands in `credentials::CredentialStore` and the original
//!    request is retried once
//! 4. If the refresh fails the store is cleared and the `navigator::Navigator`
//!    is sent to the login page

pub mod client;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod navigator;
pub mod token;

pub use client::{ApiRequest, SessionClient};
pub use config::ClientConfig;
pub use constants::*;
pub use coordinator::RefreshCoordinator;
pub use credentials::{AccessToken, CredentialStore};
pub use error::{Error, Result};
pub use navigator::{LogNavigator, Navigator, RecordingNavigator};
pub use token::{RefreshResponse, request_access_token, request_logout};
