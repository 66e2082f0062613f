//! Middleware modules for the manga API
//!
//! - `auth`: bearer-token authentication and the admin role gate
//!
//! # Middleware Order
//!
//! ```ignore
//! Router::new()
//!     .route("/admin/resource", post(handler))
//!     // Runs second: needs the AuthContext
//!     .layer(middleware::from_fn(require_admin))
//!     // Runs first: validates the token and injects the AuthContext
//!     .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
//! ```

mod auth;

pub use auth::{
    auth_middleware, extract_auth_context, require_admin, AuthExtractor, AuthMiddlewareError,
    AuthMiddlewareState,
};
