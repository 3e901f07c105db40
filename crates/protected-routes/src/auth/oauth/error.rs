//! The 401 returned by the authorization gate.
//!
//! Carries a `WWW-Authenticate` challenge pointing at the route's metadata
//! document, per [RFC 9728 §5.1](https://datatracker.ietf.org/doc/html/rfc9728#name-www-authenticate-response).

use crate::route::path::{metadata_url, resource_url};
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::{HeaderValue, StatusCode, Uri, header::WWW_AUTHENTICATE};
use serde_json::json;
use thiserror::Error;
use url::Url;

/// What the gate of one protected route needs to know.
#[derive(Clone, Debug)]
pub struct ResourceServerConfig {
    /// Origin the server is reachable at.
    pub origin: Url,
    /// Scopes the route declares, handed to the validator.
    pub required_scopes: Vec<String>,
}

impl ResourceServerConfig {
    /// Absolute URL of the metadata document for `request_path`.
    pub fn resource_metadata_url(&self, request_path: &str) -> String {
        metadata_url(&self.origin, request_path)
    }

    /// Absolute URL of the request on the configured origin.
    ///
    /// The path is appended verbatim, never resolved as a reference, so a
    /// `//host/...` path cannot change the host.
    pub fn request_url(&self, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        resource_url(&self.origin, path_and_query)
    }
}

/// `Bearer resource_metadata="<url>"`.
pub fn www_authenticate_401(resource_metadata_url: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "Bearer resource_metadata=\"{resource_metadata_url}\""
    ))
    .ok()
}

/// The request carried no acceptable bearer token.
///
/// Deliberately says nothing about why.
#[derive(Error, Debug)]
#[error("unauthorized")]
pub struct AuthorizationError {
    resource_metadata_url: String,
}

impl AuthorizationError {
    pub fn new(resource_metadata_url: impl Into<String>) -> Self {
        Self {
            resource_metadata_url: resource_metadata_url.into(),
        }
    }

    pub fn resource_metadata_url(&self) -> &str {
        &self.resource_metadata_url
    }
}

impl IntoResponse for AuthorizationError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "statusCode": 401,
            "code": "UNAUTHORIZED",
            "error": "Unauthorized",
            "message": "Unauthorized",
        }));
        let mut response = (StatusCode::UNAUTHORIZED, body).into_response();

        match www_authenticate_401(&self.resource_metadata_url) {
            Some(value) => {
                response.headers_mut().insert(WWW_AUTHENTICATE, value);
            }
            None => tracing::warn!(
                url = %self.resource_metadata_url,
                "metadata url is not a valid header value"
            ),
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn config() -> ResourceServerConfig {
        ResourceServerConfig {
            origin: Url::parse("http://localhost:3000").unwrap(),
            required_scopes: vec![],
        }
    }

    #[test]
    fn challenge_format() {
        let value = www_authenticate_401("http://localhost:3000/.well-known/oauth-protected-resource")
            .unwrap();
        assert_eq!(
            value,
            "Bearer resource_metadata=\"http://localhost:3000/.well-known/oauth-protected-resource\""
        );
    }

    #[test]
    fn resolves_request_urls() {
        let config = config();
        let uri: Uri = "/protected/1?x=y".parse().unwrap();
        assert_eq!(config.request_url(&uri), "http://localhost:3000/protected/1?x=y");
        assert_eq!(
            config.resource_metadata_url(uri.path()),
            "http://localhost:3000/.well-known/oauth-protected-resource/protected/1"
        );
    }

    #[test]
    fn scheme_relative_paths_stay_on_origin() {
        let config = ResourceServerConfig {
            origin: Url::parse("https://api.example.com").unwrap(),
            required_scopes: vec![],
        };
        let uri: Uri = "//evil.example/x".parse().unwrap();
        assert_eq!(config.request_url(&uri), "https://api.example.com//evil.example/x");
    }

    #[tokio::test]
    async fn renders_structured_401() {
        let response = AuthorizationError::new("http://localhost:3000/.well-known/oauth-protected-resource")
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert_eq!(body["statusCode"], 401);
    }
}
