//! HTTP Basic authentication for `/api/*`.
//!
//! Credentials are `user:password` pairs from configuration. An empty set
//! disables authentication entirely; `/health` is never behind it.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Challenge sent with every 401.
pub const CHALLENGE: &str = "Basic realm=\"xferd\"";

/// A `user:password` entry that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid credential {0:?}: expected user:password")]
pub struct CredentialParseError(pub String);

/// Accepted username/password pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    users: HashMap<String, String>,
}

impl Credentials {
    /// No users; authentication disabled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse `user:password` entries. The password may itself contain `:`.
    pub fn parse<I, S>(entries: I) -> Result<Self, CredentialParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut users = HashMap::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            match entry.split_once(':') {
                Some((user, password)) if !user.is_empty() => {
                    users.insert(user.to_string(), password.to_string());
                }
                _ => return Err(CredentialParseError(entry.to_string())),
            }
        }
        Ok(Self { users })
    }

    /// Add one user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(user.into(), password.into());
        self
    }

    /// Whether any user is configured.
    pub fn is_enabled(&self) -> bool {
        !self.users.is_empty()
    }

    /// Number of configured users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no user is configured.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Check a raw `Authorization` header value.
    pub fn verify_header(&self, value: &str) -> bool {
        let Some(encoded) = value
            .strip_prefix("Basic ")
            .or_else(|| value.strip_prefix("basic "))
        else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(pair) = String::from_utf8(decoded) else {
            return false;
        };
        pair.split_once(':').is_some_and(|(user, password)| {
            self.users
                .get(user)
                .is_some_and(|expected| expected == password)
        })
    }
}

/// Auth middleware: validate Basic credentials.
///
/// Returns 401 with `WWW-Authenticate: Basic realm="xferd"` on failure.
pub async fn require_basic_auth(
    State(credentials): State<Arc<Credentials>>,
    req: Request,
    next: Next,
) -> Response {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| credentials.verify_header(v));

    if authorized {
        return next.run(req).await;
    }

    tracing::warn!(
        path = %req.uri().path(),
        "Unauthorized API request - missing or invalid credentials"
    );
    let mut res = StatusCode::UNAUTHORIZED.into_response();
    res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(CHALLENGE),
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
    }

    #[test]
    fn parse_pairs() {
        let creds = Credentials::parse(["alice:secret", " bob:p:w ", ""]).unwrap();
        assert_eq!(creds.len(), 2);
        assert!(creds.verify_header(&basic("bob", "p:w")));
    }

    #[test]
    fn parse_rejects_malformed_entries() {
        assert_eq!(
            Credentials::parse(["nocolon"]),
            Err(CredentialParseError("nocolon".into()))
        );
        assert!(Credentials::parse([":pw"]).is_err());
    }

    #[test]
    fn verify_checks_user_and_password() {
        let creds = Credentials::none().with_user("alice", "secret");
        assert!(creds.is_enabled());
        assert!(creds.verify_header(&basic("alice", "secret")));
        assert!(!creds.verify_header(&basic("alice", "wrong")));
        assert!(!creds.verify_header(&basic("mallory", "secret")));
        assert!(!creds.verify_header("Bearer abc"));
        assert!(!creds.verify_header("Basic !!!not-base64"));
    }

    #[test]
    fn empty_set_is_disabled() {
        assert!(!Credentials::none().is_enabled());
        assert!(Credentials::parse(Vec::<String>::new()).unwrap().is_empty());
    }
}
