//! # protected-routes
//!
//! Per-route bearer-token authorization for [axum](https://docs.rs/axum),
//! with OAuth 2.0 Protected Resource Metadata
//! ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)) published
//! for every protected route.
//!
//! Register routes through a [`ProtectedRouter`]. Each protected route is
//! gated by [`auth::AuthLayer`] and gets a public `GET` sibling under
//! `/.well-known/oauth-protected-resource`. Clients that are turned away
//! receive a `WWW-Authenticate` header pointing there.
//!
//! ```rust,ignore
//! use protected_routes::auth::jwt::JwtValidator;
//! use protected_routes::{ProtectedRouter, ProtectedRoutesConfig, RouteDescriptor};
//!
//! let config = ProtectedRoutesConfig::new("http://localhost:3000", ["http://localhost:3000"])?
//!     .all_routes_require_authorization(true);
//! let validator = JwtValidator::new(
//!     jwks,
//!     |sub: String| async move { anyhow::Ok(!sub.is_empty()) },
//!     |aud: String, url: String| async move { anyhow::Ok(url.starts_with(&aud)) },
//! );
//!
//! let app = ProtectedRouter::new(config, validator)
//!     .get("/protected/:arg", handler)?
//!     .route(RouteDescriptor::new(Method::GET, "/health").protected(false), health)?
//!     .into_router();
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub use axum;

pub mod auth;
pub mod config;
pub mod route;
mod router;

#[cfg(all(test, feature = "jwt"))]
mod test_support;

pub use config::{ConfigError, ProtectedRoutesConfig};
pub use route::{Protection, ProtectionConfig, RouteDescriptor, RouteKind, RoutePolicy};
pub use router::{ProtectedRouter, RegistrationError};
