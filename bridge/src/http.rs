//! # HTTP
//!
//! Conversion of handler results into HTTP responses.

use http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use http::{HeaderValue, Response, StatusCode};
use serde::Serialize;

use crate::Error;
use crate::error::server;

/// Convert a handler result into an HTTP response.
pub trait IntoHttp {
    /// Build the HTTP response.
    fn into_http(self) -> Response<String>;
}

/// Successful responses are serialized as JSON with `200 OK`. Errors are
/// serialized as an `OAuth 2.0` error object with a status derived from the
/// error code.
///
/// Token responses contain credentials so every response is marked as
/// uncacheable (RFC6749 section 5.1).
impl<T: Serialize> IntoHttp for Result<T, Error> {
    fn into_http(self) -> Response<String> {
        let (status, body) = match self {
            Ok(body) => match serde_json::to_string(&body) {
                Ok(json) => (StatusCode::OK, json),
                Err(e) => {
                    let err = server!("issue serializing response: {e}");
                    (err.status(), error_json(&err))
                }
            },
            Err(err) => (err.status(), error_json(&err)),
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        response
    }
}

fn error_json(err: &Error) -> String {
    serde_json::to_string(err).unwrap_or_else(|_| {
        r#"{"error":"server_error","error_description":"unexpected error"}"#.to_string()
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::types::TokenResponse;

    #[test]
    fn token_response() {
        let result: Result<TokenResponse, Error> =
            Ok(TokenResponse { access_token: "at".into(), expires_in: 60, ..Default::default() });
        let response = result.into_http();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[PRAGMA], "no-cache");

        let body: Value = serde_json::from_str(response.body()).unwrap();
        assert_eq!(body, json!({"access_token": "at", "token_type": "Bearer", "expires_in": 60}));
    }

    #[test]
    fn server_error() {
        let result: Result<TokenResponse, Error> =
            Err(Error::ServerError("nonce service returned status 500".into()));
        let response = result.into_http();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(response.body()).unwrap();
        assert_eq!(body["error"], "server_error");
    }
}
