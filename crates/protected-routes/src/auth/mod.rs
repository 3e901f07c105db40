//! Authorization gate for protected routes.
//!
//! [`AuthLayer`] wraps a single route. Before the route handler runs it pulls
//! the bearer token out of the `Authorization` header and asks a
//! [`Validator`] whether it grants access to the requested URL. Anything
//! else ends the request with an [`AuthorizationError`], a 401 carrying a
//! `WWW-Authenticate` hint at the route's metadata document.
//!
//! [`ProtectedRouter`](crate::ProtectedRouter) installs the layer; using it
//! by hand looks like this:
//!
//! ```rust,ignore
//! use protected_routes::auth::{AuthLayer, oauth::ResourceServerConfig};
//!
//! let gate = ResourceServerConfig {
//!     origin: "https://api.example.com".parse()?,
//!     required_scopes: vec![],
//! };
//!
//! let app = axum::Router::new()
//!     .route("/protected", get(handler).layer(AuthLayer::new(validator, gate)));
//! ```

mod bearer;

pub mod oauth;
pub mod predicate;

#[cfg(feature = "jwt")]
pub mod jwt;
#[cfg(feature = "jwt")]
pub mod keys;

pub use bearer::bearer_token;

use futures::future::BoxFuture;
use http::{Request, Response};
use oauth::{AuthorizationError, ResourceServerConfig};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Decides whether a bearer token grants access.
///
/// Implementations never fail: every problem is a `false`.
pub trait Validator: Clone + Send + Sync + 'static {
    /// Validate `token` for a request to `url` on a route declaring `scopes`.
    fn validate(
        &self,
        token: &str,
        url: &str,
        scopes: &[String],
    ) -> impl Future<Output = bool> + Send;
}

/// Run the gate against the head of a request.
pub async fn authorize<V: Validator>(
    validator: &V,
    config: &ResourceServerConfig,
    parts: &http::request::Parts,
) -> Result<(), AuthorizationError> {
    let valid = match bearer_token(&parts.headers) {
        Some(token) => {
            let url = config.request_url(&parts.uri);
            validator.validate(token, &url, &config.required_scopes).await
        }
        None => {
            tracing::debug!(path = parts.uri.path(), "missing bearer token");
            false
        }
    };

    if valid {
        Ok(())
    } else {
        Err(AuthorizationError::new(
            config.resource_metadata_url(parts.uri.path()),
        ))
    }
}

/// Tower [`Layer`](tower::Layer) that applies [`AuthService`].
#[derive(Clone)]
pub struct AuthLayer<V> {
    validator: V,
    config: Arc<ResourceServerConfig>,
}

impl<V> AuthLayer<V> {
    pub fn new(validator: V, config: ResourceServerConfig) -> Self {
        Self {
            validator,
            config: Arc::new(config),
        }
    }
}

impl<V, S> tower::Layer<S> for AuthLayer<V>
where
    V: Clone,
{
    type Service = AuthService<V, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            validator: self.validator.clone(),
            config: self.config.clone(),
            inner,
        }
    }
}

/// Tower service that authorizes requests before forwarding them.
#[derive(Clone)]
pub struct AuthService<V, S> {
    validator: V,
    config: Arc<ResourceServerConfig>,
    inner: S,
}

impl<V, S, B> tower::Service<Request<B>> for AuthService<V, S>
where
    V: Validator,
    S: tower::Service<Request<B>, Response = Response<axum::body::Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let validator = self.validator.clone();
        let config = self.config.clone();
        let mut inner = self.inner.clone();
        // swap to ensure poll_ready state is preserved
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            match authorize(&validator, &config, &parts).await {
                Ok(()) => inner.call(Request::from_parts(parts, body)).await,
                Err(err) => Ok(axum::response::IntoResponse::into_response(err)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::{StatusCode, header::WWW_AUTHENTICATE};
    use std::convert::Infallible;
    use std::sync::Mutex;
    use tower::{Layer, Service, ServiceExt};

    #[derive(Clone)]
    struct OkService;

    impl Service<Request<Body>> for OkService {
        type Response = Response<Body>;
        type Error = Infallible;
        type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<Body>) -> Self::Future {
            Box::pin(async { Ok(Response::new(Body::from("handled"))) })
        }
    }

    /// Accepts `"good"` and records what it was asked.
    #[derive(Clone, Default)]
    struct RecordingValidator {
        calls: Arc<Mutex<Vec<(String, String, Vec<String>)>>>,
    }

    impl Validator for RecordingValidator {
        async fn validate(&self, token: &str, url: &str, scopes: &[String]) -> bool {
            self.calls
                .lock()
                .unwrap()
                .push((token.into(), url.into(), scopes.to_vec()));
            token == "good"
        }
    }

    fn config() -> ResourceServerConfig {
        ResourceServerConfig {
            origin: "http://localhost:3000".parse().unwrap(),
            required_scopes: vec!["read".into()],
        }
    }

    fn request(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/protected/7?q=1");
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn missing_token_returns_401_with_hint() {
        let validator = RecordingValidator::default();
        let service = AuthLayer::new(validator.clone(), config()).layer(OkService);

        let resp = service.oneshot(request(None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()[WWW_AUTHENTICATE],
            "Bearer resource_metadata=\"http://localhost:3000/.well-known/oauth-protected-resource/protected/7\""
        );
        assert!(validator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let validator = RecordingValidator::default();
        let service = AuthLayer::new(validator.clone(), config()).layer(OkService);

        let resp = service.oneshot(request(Some("Bearer good"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!resp.headers().contains_key(WWW_AUTHENTICATE));

        let calls = validator.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            [(
                "good".to_string(),
                "http://localhost:3000/protected/7?q=1".to_string(),
                vec!["read".to_string()]
            )]
        );
    }

    #[tokio::test]
    async fn scheme_relative_path_is_validated_against_origin() {
        let validator = RecordingValidator::default();
        let service = AuthLayer::new(validator.clone(), config()).layer(OkService);

        let req = Request::builder()
            .uri("//evil.example/x")
            .header("Authorization", "Bearer good")
            .body(Body::empty())
            .unwrap();
        service.oneshot(req).await.unwrap();

        let calls = validator.calls.lock().unwrap();
        assert_eq!(calls[0].1, "http://localhost:3000//evil.example/x");
    }

    #[tokio::test]
    async fn rejected_token_returns_401() {
        let service = AuthLayer::new(RecordingValidator::default(), config()).layer(OkService);
        let resp = service.oneshot(request(Some("Bearer bad"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn lowercase_scheme_counts_as_missing() {
        let validator = RecordingValidator::default();
        let service = AuthLayer::new(validator.clone(), config()).layer(OkService);

        let resp = service.oneshot(request(Some("bearer good"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(validator.calls.lock().unwrap().is_empty());
    }
}
