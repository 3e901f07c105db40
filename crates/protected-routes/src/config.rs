//! Process-wide configuration supplied at startup.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Errors from building a [`ProtectedRoutesConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid origin {origin:?}: {source}")]
    Origin {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid authorization server {server:?}: {source}")]
    AuthorizationServer {
        server: String,
        #[source]
        source: url::ParseError,
    },
}

/// Settings shared by every protected route.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedRoutesConfig {
    /// Absolute base URL the server is reachable at.
    pub origin: Url,
    /// Authorization servers advertised in every metadata document, verbatim.
    pub authorization_servers: Vec<String>,
    /// Protection of routes that declare none.
    #[serde(default)]
    pub all_routes_require_authorization: bool,
}

impl ProtectedRoutesConfig {
    /// Parse `origin` and check that every authorization server is an
    /// absolute URL.
    pub fn new(
        origin: &str,
        authorization_servers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ConfigError> {
        let origin_url = Url::parse(origin).map_err(|source| ConfigError::Origin {
            origin: origin.to_owned(),
            source,
        })?;

        let authorization_servers = authorization_servers
            .into_iter()
            .map(Into::into)
            .map(|server: String| match Url::parse(&server) {
                Ok(_) => Ok(server),
                Err(source) => Err(ConfigError::AuthorizationServer { server, source }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            origin: origin_url,
            authorization_servers,
            all_routes_require_authorization: false,
        })
    }

    pub fn all_routes_require_authorization(mut self, enabled: bool) -> Self {
        self.all_routes_require_authorization = enabled;
        self
    }
}
