//! Basic-Auth verification for the webhook endpoint.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

/// Realm advertised in the `WWW-Authenticate` challenge.
const CHALLENGE: &str = r#"Basic realm="Login Required""#;

/// Username and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse the `Authorization` header of a request.
    ///
    /// Returns `None` when the header is absent, not Basic, or malformed.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self::new(username, password))
    }

    /// Compare against the expected credentials in constant time.
    #[must_use]
    pub fn matches(&self, expected: &Self) -> bool {
        let username_ok = self.username.as_bytes().ct_eq(expected.username.as_bytes());
        let password_ok = self.password.as_bytes().ct_eq(expected.password.as_bytes());
        (username_ok & password_ok).into()
    }
}

/// Check a request's headers against the configured credentials.
#[must_use]
pub fn is_authorized(headers: &HeaderMap, expected: &BasicCredentials) -> bool {
    BasicCredentials::from_headers(headers).is_some_and(|given| given.matches(expected))
}

/// 401 response asking the client to authenticate.
#[must_use]
pub fn challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE))],
        "Login required",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    #[test]
    fn test_parse_basic_header() {
        let creds = BasicCredentials::from_headers(&headers_with(&basic("admin", "p:ss"))).unwrap();
        assert_eq!(creds.username, "admin");
        // Only the first colon separates username from password.
        assert_eq!(creds.password, "p:ss");
    }

    #[test]
    fn test_reject_other_schemes_and_garbage() {
        assert!(BasicCredentials::from_headers(&headers_with("Bearer abc")).is_none());
        assert!(BasicCredentials::from_headers(&headers_with("Basic !!!")).is_none());
        assert!(BasicCredentials::from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_is_authorized() {
        let expected = BasicCredentials::new("admin", "s3cret");
        assert!(is_authorized(&headers_with(&basic("admin", "s3cret")), &expected));
        assert!(!is_authorized(&headers_with(&basic("admin", "wrong")), &expected));
        assert!(!is_authorized(&headers_with(&basic("root", "s3cret")), &expected));
        assert!(!is_authorized(&headers_with(&basic("admin", "s3cre")), &expected));
        assert!(!is_authorized(&HeaderMap::new(), &expected));
    }

    #[test]
    fn test_challenge_response() {
        let response = challenge();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            r#"Basic realm="Login Required""#
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = BasicCredentials::new("admin", "s3cret");
        assert!(!format!("{creds:?}").contains("s3cret"));
    }
}
