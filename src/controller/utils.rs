use std::net::SocketAddr;
use std::str;

use failure::{Error as FailureError, Fail};
use futures::{Future, Stream};
use hyper::header::{Authorization, Bearer, Cookie, Headers};
use hyper::server::Request;
use hyper::Body;
use jsonwebtoken::{decode, Validation};
use serde::de::DeserializeOwned;
use serde_json;

use config::Config;
use controller::context::DynamicContext;
use errors::Error;
use types::UserId;

/// Claims carried by account tokens
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JWTPayload {
    pub user_id: UserId,
    pub exp: i64,
}

/// Reads the whole body and parses it as JSON
pub fn parse_body<T>(body: Body) -> Box<Future<Item = T, Error = FailureError>>
where
    T: DeserializeOwned + 'static,
{
    Box::new(
        body.concat2()
            .map_err(|e| FailureError::from(e.context("Failed to read request body").context(Error::Parse)))
            .and_then(|chunk| {
                serde_json::from_slice::<T>(&chunk).map_err(|e| FailureError::from(e.context("Failed to parse request body").context(Error::Parse)))
            }),
    )
}

fn raw_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .get_raw(name)
        .and_then(|raw| raw.one())
        .and_then(|bytes| str::from_utf8(bytes).ok())
}

/// First hop of `X-Forwarded-For` if the proxy is trusted, otherwise the peer address
pub fn extract_address(headers: &Headers, remote_addr: Option<SocketAddr>, trust_forwarded_for: bool) -> Option<String> {
    let forwarded = if trust_forwarded_for {
        raw_header(headers, "X-Forwarded-For")
            .and_then(|value| value.split(',').next())
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
    } else {
        None
    };

    forwarded.or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
}

pub fn extract_session_marker(headers: &Headers, cookie_name: &str) -> Option<String> {
    headers
        .get::<Cookie>()
        .and_then(|cookie| cookie.get(cookie_name))
        .map(|marker| marker.to_string())
}

/// Absent token means a guest. A token that is present but unreadable is rejected.
pub fn extract_user_id(headers: &Headers, secret: &str) -> Result<Option<UserId>, FailureError> {
    if headers.get_raw("Authorization").is_none() {
        return Ok(None);
    }

    let token = headers
        .get::<Authorization<Bearer>>()
        .map(|auth| auth.0.token.clone())
        .ok_or_else(|| format_err!("Authorization header is not a bearer token").context(Error::Unauthorized))?;

    decode::<JWTPayload>(&token, secret.as_bytes(), &Validation::default())
        .map(|data| Some(data.claims.user_id))
        .map_err(|e| format_err!("Invalid token: {}", e).context(Error::Unauthorized).into())
}

/// Collects the per request facts services need
pub fn dynamic_context(req: &Request, config: &Config) -> Result<DynamicContext, FailureError> {
    let headers = req.headers();
    let user_id = extract_user_id(headers, &config.jwt.secret)?;
    let address = extract_address(headers, req.remote_addr(), config.claims.trust_forwarded_for);
    let session_marker = extract_session_marker(headers, &config.claims.session_cookie);
    let user_agent = raw_header(headers, "User-Agent").map(|agent| agent.to_string());

    Ok(DynamicContext::new(user_id, address, session_marker, user_agent))
}

#[cfg(test)]
pub mod tests {
    use std::net::SocketAddr;

    use chrono::{Duration, Utc};
    use hyper::header::{Authorization, Bearer, Headers};
    use jsonwebtoken::{encode, Header};

    use super::*;

    pub const MOCK_SECRET: &str = "change-me";

    pub fn create_token(user_id: UserId, secret: &str) -> String {
        let payload = JWTPayload {
            user_id,
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        encode(&Header::default(), &payload, secret.as_bytes()).unwrap()
    }

    #[test]
    fn test_forwarded_for_is_used_only_when_trusted() {
        let peer: SocketAddr = "192.0.2.10:55000".parse().unwrap();
        let mut headers = Headers::new();
        headers.set_raw("X-Forwarded-For", "203.0.113.7, 10.0.0.1");

        assert_eq!(extract_address(&headers, Some(peer), true), Some("203.0.113.7".to_string()));
        assert_eq!(extract_address(&headers, Some(peer), false), Some("192.0.2.10".to_string()));
        assert_eq!(extract_address(&Headers::new(), None, true), None);
    }

    #[test]
    fn test_session_marker_from_cookie() {
        let mut headers = Headers::new();
        headers.set_raw("Cookie", "theme=dark; coupon_session=abc123");

        assert_eq!(extract_session_marker(&headers, "coupon_session"), Some("abc123".to_string()));
        assert_eq!(extract_session_marker(&headers, "other"), None);
    }

    #[test]
    fn test_user_id_from_token() {
        let mut headers = Headers::new();
        assert_eq!(extract_user_id(&headers, MOCK_SECRET).unwrap(), None);

        headers.set(Authorization(Bearer {
            token: create_token(UserId(7), MOCK_SECRET),
        }));
        assert_eq!(extract_user_id(&headers, MOCK_SECRET).unwrap(), Some(UserId(7)));
    }

    #[test]
    fn test_bad_token_is_unauthorized() {
        let mut headers = Headers::new();
        headers.set(Authorization(Bearer {
            token: create_token(UserId(7), "another-secret"),
        }));
        let e = extract_user_id(&headers, MOCK_SECRET).unwrap_err();
        match Error::find_in(&e) {
            Some(&Error::Unauthorized) => {}
            other => panic!("Expected Unauthorized, got {:?}", other),
        }

        let mut headers = Headers::new();
        headers.set_raw("Authorization", "Basic dXNlcjpwYXNz");
        assert!(extract_user_id(&headers, MOCK_SECRET).is_err());
    }
}
