//! Route registration.
//!
//! [`ProtectedRouter`] resolves the [`RoutePolicy`] of each route as it is
//! registered. For a protected route it wraps the handler in an
//! [`AuthLayer`] and registers a public metadata route at the derived
//! well-known path. The result is a plain [`axum::Router`].

use crate::auth::oauth::{ResourceServerConfig, metadata_responder};
use crate::auth::{AuthLayer, Validator};
use crate::config::ProtectedRoutesConfig;
use crate::route::path::{axum_path, derived_metadata_path, route_shape};
use crate::route::{RouteDescriptor, RouteKind, RoutePolicy};
use axum::handler::Handler;
use axum::routing::{MethodFilter, MethodRouter, on};
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Registration failures. Fatal for server startup.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },

    #[error("route {path} conflicts with {existing}, parameter names must match")]
    ConflictingRoute { path: String, existing: String },

    #[error("route path {0:?} must start with '/'")]
    InvalidPath(String),

    #[error("method {0} cannot be routed")]
    UnsupportedMethod(Method),
}

/// Builder of an [`axum::Router`] whose routes may require a bearer token.
pub struct ProtectedRouter<V> {
    config: Arc<ProtectedRoutesConfig>,
    validator: V,
    router: axum::Router,
    policies: HashMap<(Method, String), RoutePolicy>,
    /// Template first registered for each [`route_shape`].
    shapes: HashMap<String, String>,
}

impl<V: Validator> ProtectedRouter<V> {
    pub fn new(config: ProtectedRoutesConfig, validator: V) -> Self {
        Self {
            config: Arc::new(config),
            validator,
            router: axum::Router::new(),
            policies: HashMap::new(),
            shapes: HashMap::new(),
        }
    }

    /// Register `handler` for `route`.
    pub fn route<H, T>(mut self, route: RouteDescriptor, handler: H) -> Result<Self, RegistrationError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(route.method.clone())
            .map_err(|_| RegistrationError::UnsupportedMethod(route.method.clone()))?;
        self.register(route, on(filter, handler))?;
        Ok(self)
    }

    /// `GET` route with the default protection.
    pub fn get<H, T>(self, path: &str, handler: H) -> Result<Self, RegistrationError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(RouteDescriptor::new(Method::GET, path), handler)
    }

    /// `POST` route with the default protection.
    pub fn post<H, T>(self, path: &str, handler: H) -> Result<Self, RegistrationError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(RouteDescriptor::new(Method::POST, path), handler)
    }

    pub fn put<H, T>(self, path: &str, handler: H) -> Result<Self, RegistrationError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(RouteDescriptor::new(Method::PUT, path), handler)
    }

    pub fn patch<H, T>(self, path: &str, handler: H) -> Result<Self, RegistrationError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(RouteDescriptor::new(Method::PATCH, path), handler)
    }

    pub fn delete<H, T>(self, path: &str, handler: H) -> Result<Self, RegistrationError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(RouteDescriptor::new(Method::DELETE, path), handler)
    }

    /// Policy resolved for a registered route.
    pub fn policy(&self, method: &Method, path: &str) -> Option<&RoutePolicy> {
        self.policies.get(&(method.clone(), path.to_owned()))
    }

    pub fn into_router(self) -> axum::Router {
        self.router
    }

    fn register(&mut self, route: RouteDescriptor, handler: MethodRouter) -> Result<(), RegistrationError> {
        if !route.path.starts_with('/') {
            return Err(RegistrationError::InvalidPath(route.path));
        }

        let key = (route.method.clone(), route.path.clone());
        if self.policies.contains_key(&key) {
            // several templates can share one metadata path
            if route.kind == RouteKind::SyntheticMetadata {
                tracing::debug!(path = %route.path, "metadata route already registered");
                return Ok(());
            }
            return Err(RegistrationError::DuplicateRoute {
                method: route.method,
                path: route.path,
            });
        }

        let axum_route = axum_path(&route.path);
        let shape = route_shape(&route.path);
        if let Some(existing) = self.shapes.get(&shape) {
            if axum_path(existing) != axum_route {
                if route.kind == RouteKind::SyntheticMetadata {
                    tracing::debug!(path = %route.path, %existing, "metadata route shadowed");
                    return Ok(());
                }
                return Err(RegistrationError::ConflictingRoute {
                    path: route.path,
                    existing: existing.clone(),
                });
            }
        }

        let policy = RoutePolicy::resolve(&route, self.config.all_routes_require_authorization);
        let handler = if policy.is_protected() {
            tracing::info!(
                method = %route.method,
                path = %route.path,
                scopes = ?policy.required_scopes,
                "protecting route"
            );
            handler.layer(AuthLayer::new(
                self.validator.clone(),
                ResourceServerConfig {
                    origin: self.config.origin.clone(),
                    required_scopes: policy.required_scopes.clone(),
                },
            ))
        } else {
            handler
        };

        let router = std::mem::take(&mut self.router);
        self.router = router.route(&axum_route, handler);
        self.policies.insert(key, policy.clone());
        self.shapes.entry(shape).or_insert_with(|| route.path.clone());

        if policy.is_protected() {
            let metadata_path = derived_metadata_path(&route.path);
            let responder = metadata_responder(
                &route.path,
                self.config.clone(),
                policy.required_scopes,
            );
            self.register(RouteDescriptor::metadata(metadata_path), responder)?;
        }
        Ok(())
    }
}
