//! OAuth 2.0 Protected Resource Metadata (RFC 9728).
//!
//! Every protected route gets a sibling `GET` endpoint under
//! `/.well-known/oauth-protected-resource<route>` telling clients which
//! authorization servers issue tokens for it. The `resource` is resolved
//! against the parameters of the metadata request, so `/protected/:arg`
//! yields a document for the concrete `/protected/123`.

use crate::config::ProtectedRoutesConfig;
use crate::route::path::{derived_metadata_path, interpolate, match_params, resource_url};
use axum::{Json, routing::MethodRouter};
use http::Uri;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// OAuth 2.0 Protected Resource Metadata ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// Absolute URL of the resource.
    pub resource: String,

    /// Authorization server(s) that can issue tokens for this resource.
    pub authorization_servers: Vec<String>,

    /// Scopes the route declares, empty if none.
    pub scopes_supported: Vec<String>,

    /// Always `["body"]`.
    pub bearer_methods_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    pub fn new(
        resource: String,
        authorization_servers: Vec<String>,
        scopes_supported: Vec<String>,
    ) -> Self {
        Self {
            resource,
            authorization_servers,
            scopes_supported,
            bearer_methods_supported: vec!["body".into()],
        }
    }
}

/// `GET` handler serving the metadata of the route declared as
/// `route_template`.
///
/// Computed per request, nothing is cached.
pub fn metadata_responder(
    route_template: &str,
    config: Arc<ProtectedRoutesConfig>,
    scopes_supported: Vec<String>,
) -> MethodRouter {
    let template: Arc<str> = route_template.into();
    let metadata_template: Arc<str> = derived_metadata_path(route_template).into();
    let scopes: Arc<[String]> = scopes_supported.into();

    axum::routing::get(move |uri: Uri| {
        let template = template.clone();
        let metadata_template = metadata_template.clone();
        let config = config.clone();
        let scopes = scopes.clone();
        async move {
            let params = match_params(&metadata_template, uri.path()).unwrap_or_default();
            let resolved = interpolate(&template, params);
            Json(ProtectedResourceMetadata::new(
                resource_url(&config.origin, &resolved),
                config.authorization_servers.clone(),
                scopes.to_vec(),
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode, header::CONTENT_TYPE};
    use tower::ServiceExt;

    fn config() -> Arc<ProtectedRoutesConfig> {
        Arc::new(
            ProtectedRoutesConfig::new("http://localhost:3000", ["http://auth.local"]).unwrap(),
        )
    }

    async fn fetch(router: axum::Router, uri: &str) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn serves_interpolated_resource() {
        let router = axum::Router::new().route(
            "/.well-known/oauth-protected-resource/protected/{arg}",
            metadata_responder("/protected/:arg", config(), vec!["read".into()]),
        );

        let (status, content_type, body) =
            fetch(router, "/.well-known/oauth-protected-resource/protected/123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(
            body,
            serde_json::json!({
                "resource": "http://localhost:3000/protected/123",
                "authorization_servers": ["http://auth.local"],
                "scopes_supported": ["read"],
                "bearer_methods_supported": ["body"],
            })
        );
    }

    #[tokio::test]
    async fn root_route_metadata() {
        let router = axum::Router::new().route(
            "/.well-known/oauth-protected-resource",
            metadata_responder("/", config(), vec![]),
        );

        let (_, _, body) = fetch(router, "/.well-known/oauth-protected-resource").await;
        assert_eq!(body["resource"], "http://localhost:3000/");
        assert_eq!(body["scopes_supported"], serde_json::json!([]));
    }
}
