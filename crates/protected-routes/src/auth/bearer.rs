//! Bearer token extraction.

use http::{HeaderMap, header::AUTHORIZATION};

/// Token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-sensitively, anything else (including
/// `bearer <token>` or an empty token) counts as no token at all.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::bearer_token;
    use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn extracts_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
    }

    #[test]
    fn scheme_is_case_sensitive() {
        assert_eq!(bearer_token(&headers("bearer abc")), None);
        assert_eq!(bearer_token(&headers("BEARER abc")), None);
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_absent() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
