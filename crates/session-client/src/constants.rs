//! Default session endpoint locations and timing
//!
//! Paths are relative to the dashboard API base URL. The gateway serves both
//! endpoints; the refresh endpoint reads the httpOnly session cookie, which
//! the client never touches directly.

/// Session refresh endpoint. Responds `{"accessToken": "..."}`.
pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Logout endpoint. Expires the session cookie server-side.
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// Upper bound on a single refresh exchange. A hanging session endpoint must
/// not hold the single-flight slot forever.
pub const REFRESH_TIMEOUT_SECS: u64 = 10;

/// Default per-request timeout for wrapped API calls.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
