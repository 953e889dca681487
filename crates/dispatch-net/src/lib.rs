//! Authenticated request pipeline for the dispatch API
//!
//! Wraps `reqwest` with bearer-token injection and a single-flight token
//! refresh. Callers only ever see a decoded body or a `NetworkError`; the
//! refresh-and-replay path is invisible to them.
//!
//! Request lifecycle:
//! 1. `NetworkManager` builds the request and runs `RequestInterceptor::adapt()`
//! 2. The transport executes it; non-2xx responses are classified
//! 3. The executor asks `RequestInterceptor::should_retry()` for a verdict
//! 4. `AuthInterceptor` delegates to `RefreshCoordinator::request_retry()`
//! 5. One refresh runs per round; every queued caller gets the same verdict
//! 6. `Retry` replays the request with the new token, anything else surfaces
//!    the classified error

pub mod classify;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod interceptor;
pub mod metrics;
pub mod session;

pub use classify::{TransportFailure, TransportFailureKind, classify};
pub use coordinator::{AuthFailureHook, RETRY_LIMIT, RefreshCoordinator, RetryDecision};
pub use endpoint::{Endpoint, Route};
pub use error::{NetworkError, Result};
pub use executor::NetworkManager;
pub use interceptor::{AuthInterceptor, RequestInterceptor};
pub use session::{
    ForgotPasswordResponse, LoginResponse, RegisterRequest, RegisterResponse, SessionEvent,
    SessionEvents, SessionService, spawn_logout_listener,
};
