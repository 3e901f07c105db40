//! Resource path templating.
//!
//! Route templates use `:name` placeholders (`/protected/:arg`). The same
//! template drives the axum route, the well-known metadata path, and the
//! `resource` published in the metadata document.

use std::fmt::Display;
use url::Url;

/// Well-known path under which protected resource metadata is served
/// ([RFC 9728 §3](https://datatracker.ietf.org/doc/html/rfc9728#section-3)).
pub const WELL_KNOWN_PATH: &str = "/.well-known/oauth-protected-resource";

/// Replace every case-insensitive occurrence of `:name` in `template` with
/// the matching value.
///
/// Parameters are applied in the order given. Values are inserted verbatim,
/// no escaping is performed. Placeholders without a value stay literal.
pub fn interpolate<K, V>(template: &str, params: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: Display,
{
    let mut resolved = template.to_owned();

    for (name, value) in params {
        let placeholder = format!(":{}", name.as_ref());
        let value = value.to_string();

        let mut replaced = String::with_capacity(resolved.len());
        let mut rest = resolved.as_str();
        while let Some(at) = find_ignore_ascii_case(rest, &placeholder) {
            replaced.push_str(&rest[..at]);
            replaced.push_str(&value);
            rest = &rest[at + placeholder.len()..];
        }
        replaced.push_str(rest);
        resolved = replaced;
    }

    resolved
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.char_indices().map(|(at, _)| at).find(|&at| {
        haystack
            .get(at..at + needle.len())
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(needle))
    })
}

/// Path of the metadata document for a route template (or a concrete
/// request path).
///
/// The root path maps to the bare well-known path.
pub fn derived_metadata_path(path: &str) -> String {
    if path == "/" {
        WELL_KNOWN_PATH.to_owned()
    } else {
        format!("{WELL_KNOWN_PATH}{path}")
    }
}

/// Absolute URL of the metadata document describing `request_path`.
pub fn metadata_url(origin: &Url, request_path: &str) -> String {
    let path = derived_metadata_path(request_path);
    origin
        .join(&path)
        .map(String::from)
        .unwrap_or_else(|_| resource_url(origin, &path))
}

/// `origin` immediately followed by `path`.
pub fn resource_url(origin: &Url, path: &str) -> String {
    format!("{}{path}", origin.as_str().trim_end_matches('/'))
}

/// Capture the `:name` segments of `template` from a concrete `path`.
///
/// Returns `None` when the path does not have the template's shape.
/// Captured values keep their raw (percent-encoded) form.
pub fn match_params(template: &str, path: &str) -> Option<Vec<(String, String)>> {
    let expected: Vec<&str> = template.split('/').collect();
    let actual: Vec<&str> = path.split('/').collect();
    if expected.len() != actual.len() {
        return None;
    }

    let mut params = Vec::new();
    for (pattern, segment) in expected.into_iter().zip(actual) {
        match pattern.strip_prefix(':') {
            Some(name) if !name.is_empty() && !segment.is_empty() => {
                params.push((name.to_owned(), segment.to_owned()));
            }
            _ if pattern == segment => {}
            _ => return None,
        }
    }
    Some(params)
}

/// Translate a `:name` template into axum's `{name}` capture syntax.
pub fn axum_path(template: &str) -> String {
    template
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => format!("{{{name}}}"),
            _ => segment.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// The template with every parameter name erased.
///
/// axum cannot hold two routes of the same shape under different parameter
/// names, `/items/:id` and `/items/:item_id` both become `/items/{}`.
pub fn route_shape(template: &str) -> String {
    template
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => "{}",
            _ if segment.starts_with("{*") && segment.ends_with('}') => "{*}",
            _ if segment.starts_with('{') && segment.ends_with('}') => "{}",
            _ => segment,
        })
        .collect::<Vec<_>>()
        .join("/")
}
