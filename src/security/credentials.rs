//! Inbound credential parsing.
//!
//! Accepts `Authorization: Bearer <token>` and
//! `Authorization: Basic <base64(name:password)>`.

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// A credential presented by a client.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    Basic { name: String, password: String },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log secrets.
        match self {
            Credential::Bearer(_) => f.write_str("Bearer(..)"),
            Credential::Basic { name, .. } => write!(f, "Basic({})", name),
        }
    }
}

/// What the `Authorization` header contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presented {
    /// No `Authorization` header at all.
    Nothing,
    /// A header we could not parse; treated like a failed credential.
    Malformed,
    Credential(Credential),
}

impl Presented {
    /// Extract the credential from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Presented::Nothing;
        };
        match value.to_str().ok().and_then(parse_authorization) {
            Some(credential) => Presented::Credential(credential),
            None => Presented::Malformed,
        }
    }
}

/// Parse an `Authorization` header value.
pub fn parse_authorization(value: &str) -> Option<Credential> {
    let (scheme, rest) = value.trim().split_once(' ')?;
    let rest = rest.trim();
    if scheme.eq_ignore_ascii_case("bearer") {
        return (!rest.is_empty()).then(|| Credential::Bearer(rest.to_string()));
    }
    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD.decode(rest).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (name, password) = decoded.split_once(':')?;
        return Some(Credential::Basic {
            name: name.to_string(),
            password: password.to_string(),
        });
    }
    None
}

/// Render a Basic `Authorization` header value.
pub fn basic_authorization(name: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", name, password)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer() {
        assert_eq!(
            parse_authorization("Bearer blorp"),
            Some(Credential::Bearer("blorp".into()))
        );
        assert_eq!(
            parse_authorization("bearer   blorp "),
            Some(Credential::Bearer("blorp".into()))
        );
        assert_eq!(parse_authorization("Bearer "), None);
    }

    #[test]
    fn test_basic_round_trip() {
        let value = basic_authorization("userman", "hi");
        assert_eq!(value, "Basic dXNlcm1hbjpoaQ==");
        assert_eq!(
            parse_authorization(&value),
            Some(Credential::Basic {
                name: "userman".into(),
                password: "hi".into()
            })
        );
    }

    #[test]
    fn test_presented() {
        let mut headers = HeaderMap::new();
        assert_eq!(Presented::from_headers(&headers), Presented::Nothing);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Digest abc"));
        assert_eq!(Presented::from_headers(&headers), Presented::Malformed);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer one"));
        assert_eq!(
            Presented::from_headers(&headers),
            Presented::Credential(Credential::Bearer("one".into()))
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let c = Credential::Basic {
            name: "userman".into(),
            password: "hunter2".into(),
        };
        assert_eq!(format!("{:?}", c), "Basic(userman)");
    }
}
