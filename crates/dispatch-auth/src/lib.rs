//! Credential storage and token refresh for the dispatch API
//!
//! Holds the access/refresh token pair and user id for the signed-in session
//! and knows how to exchange a refresh token for a new pair. This crate has no
//! dependency on the request pipeline; `dispatch-net` consumes it through the
//! `TokenProvider` and `TokenRefresher` traits.
//!
//! Credential flow:
//! 1. Login/registration stores the pair via `TokenProvider::save_tokens()`
//! 2. Every authenticated request reads `TokenProvider::access_token()`
//! 3. On 401/403 the coordinator calls `TokenRefresher::refresh()` once
//! 4. `HttpTokenRefresher` posts to the refresh endpoint and saves the new pair
//! 5. Logout clears everything via `TokenProvider::clear_tokens()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod refresher;
pub mod token;

pub use constants::*;
pub use credentials::{Credentials, FileTokenStore, MemoryTokenStore, TokenProvider};
pub use error::{Error, Result};
pub use refresher::{HttpTokenRefresher, TokenRefresher};
pub use token::{RefreshRequest, TokenResponse, refresh_tokens};
