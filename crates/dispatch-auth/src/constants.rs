//! Dispatch API defaults
//!
//! Production endpoints of the dispatch backend. Binaries override them from
//! config; tests point them at a local mock server.

/// Base URL for login, registration and token refresh
pub const DEFAULT_AUTH_BASE_URL: &str = "https://transpots.ca/oapi/v1";

/// Base URL for business endpoints (orders, trips, drivers)
pub const DEFAULT_API_BASE_URL: &str = "https://transpots.ca/osapi/v1";

/// Refresh endpoint path, relative to the auth base URL
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Header carrying the signed-in user's id on every authenticated request
pub const USER_ID_HEADER: &str = "userId";
