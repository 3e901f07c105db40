//! Route declarations and the authorization policy derived from them.
//!
//! A [`RoutePolicy`] is resolved exactly once, when the route is registered
//! on a [`ProtectedRouter`](crate::ProtectedRouter), and never changes
//! afterwards.

pub mod path;

use http::Method;
use serde::Deserialize;

/// Who created a route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RouteKind {
    /// Registered by the application.
    #[default]
    Normal,
    /// Metadata endpoint synthesized for a protected route. Never guarded.
    SyntheticMetadata,
}

/// Per-route protection declaration.
///
/// Deserializes from either `true`/`false` or
/// `{ "enabled": true, "scopesSupported": ["read"] }`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Protection {
    Flag(bool),
    Config(ProtectionConfig),
}

/// Structured protection declaration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionConfig {
    pub enabled: bool,
    #[serde(default)]
    pub scopes_supported: Option<Vec<String>>,
}

impl ProtectionConfig {
    /// An enabled declaration advertising `scopes`.
    pub fn scopes(scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            enabled: true,
            scopes_supported: Some(scopes.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<bool> for Protection {
    fn from(enabled: bool) -> Self {
        Protection::Flag(enabled)
    }
}

impl From<ProtectionConfig> for Protection {
    fn from(config: ProtectionConfig) -> Self {
        Protection::Config(config)
    }
}

/// A route as declared at registration time.
#[derive(Clone, Debug)]
pub struct RouteDescriptor {
    pub method: Method,
    /// Path template, `:name` marks a parameter.
    pub path: String,
    pub protection: Option<Protection>,
    pub kind: RouteKind,
}

impl RouteDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            protection: None,
            kind: RouteKind::Normal,
        }
    }

    /// Declare protection explicitly, overriding the process-wide default.
    pub fn protected(mut self, protection: impl Into<Protection>) -> Self {
        self.protection = Some(protection.into());
        self
    }

    pub(crate) fn metadata(path: String) -> Self {
        Self {
            method: Method::GET,
            path,
            protection: None,
            kind: RouteKind::SyntheticMetadata,
        }
    }
}

/// Authorization policy of a single route.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    pub requires_authorization: bool,
    /// Empty means no scope constraint.
    pub required_scopes: Vec<String>,
    pub is_metadata_route: bool,
}

impl RoutePolicy {
    /// Resolve the policy of `route` given the process-wide default.
    ///
    /// 1. `HEAD` and `OPTIONS` routes are never protected.
    /// 2. Synthesized metadata routes are never protected.
    /// 3. An explicit declaration wins over the default in both directions.
    pub fn resolve(route: &RouteDescriptor, all_routes_require_authorization: bool) -> Self {
        if route.method == Method::HEAD || route.method == Method::OPTIONS {
            return Self::default();
        }

        if route.kind == RouteKind::SyntheticMetadata {
            return Self {
                is_metadata_route: true,
                ..Self::default()
            };
        }

        let (requires_authorization, required_scopes) = match &route.protection {
            None => (all_routes_require_authorization, Vec::new()),
            Some(Protection::Flag(enabled)) => (*enabled, Vec::new()),
            Some(Protection::Config(config)) => (
                config.enabled,
                config.scopes_supported.clone().unwrap_or_default(),
            ),
        };

        Self {
            requires_authorization,
            required_scopes,
            is_metadata_route: false,
        }
    }

    /// Whether the gate is installed and metadata published for this route.
    pub fn is_protected(&self) -> bool {
        self.requires_authorization && !self.is_metadata_route
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> RouteDescriptor {
        RouteDescriptor::new(Method::GET, path)
    }

    #[test]
    fn absent_declaration_follows_default() {
        assert!(RoutePolicy::resolve(&get("/"), true).is_protected());
        assert!(!RoutePolicy::resolve(&get("/"), false).is_protected());
    }

    #[test]
    fn explicit_flag_overrides_default() {
        assert!(RoutePolicy::resolve(&get("/").protected(true), false).is_protected());
        assert!(!RoutePolicy::resolve(&get("/").protected(false), true).is_protected());
    }

    #[test]
    fn structured_declaration_carries_scopes() {
        let route = get("/docs").protected(ProtectionConfig::scopes(["docs:read", "docs:write"]));
        let policy = RoutePolicy::resolve(&route, false);
        assert!(policy.requires_authorization);
        assert_eq!(policy.required_scopes, vec!["docs:read", "docs:write"]);

        let disabled = get("/docs").protected(ProtectionConfig {
            enabled: false,
            scopes_supported: Some(vec!["docs:read".into()]),
        });
        assert!(!RoutePolicy::resolve(&disabled, true).is_protected());
    }

    #[test]
    fn structured_declaration_without_scopes() {
        let route = get("/").protected(ProtectionConfig {
            enabled: true,
            scopes_supported: None,
        });
        let policy = RoutePolicy::resolve(&route, false);
        assert!(policy.is_protected());
        assert!(policy.required_scopes.is_empty());
    }

    #[test]
    fn head_and_options_are_never_protected() {
        for method in [Method::HEAD, Method::OPTIONS] {
            let route = RouteDescriptor::new(method, "/").protected(true);
            let policy = RoutePolicy::resolve(&route, true);
            assert_eq!(policy, RoutePolicy::default());
        }
    }

    #[test]
    fn metadata_routes_are_never_protected() {
        let route = RouteDescriptor::metadata("/.well-known/oauth-protected-resource".into());
        let policy = RoutePolicy::resolve(&route, true);
        assert!(policy.is_metadata_route);
        assert!(!policy.requires_authorization);
    }

    #[test]
    fn resolution_is_deterministic() {
        let route = get("/a").protected(ProtectionConfig::scopes(["x"]));
        assert_eq!(RoutePolicy::resolve(&route, true), RoutePolicy::resolve(&route, true));
    }

    #[test]
    fn protection_deserializes_from_flag_or_object() {
        let flag: Protection = serde_json::from_str("true").unwrap();
        assert_eq!(flag, Protection::Flag(true));

        let config: Protection =
            serde_json::from_str(r#"{"enabled":true,"scopesSupported":["read"]}"#).unwrap();
        assert_eq!(config, Protection::Config(ProtectionConfig::scopes(["read"])));
    }
}
