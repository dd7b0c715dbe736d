//! Presented-token extractor.
//!
//! Precedence: `Authorization: Bearer`, `X-Trigger-Token`, body field
//! `token` (form or JSON), then the `token` query parameter. Nothing found
//! yields an empty token, which the validator rejects.

use crate::domain::TokenSource;
use axum::{
    async_trait,
    extract::{FromRequest, Query, Request},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use zeroize::Zeroizing;

/// Custom header carrying the token
pub const TOKEN_HEADER: &str = "x-trigger-token";

#[derive(Deserialize)]
struct TokenField {
    #[serde(default)]
    token: Option<String>,
}

/// Token value as presented by the caller, wiped on drop.
pub struct PresentedToken {
    value: Zeroizing<String>,
    source: TokenSource,
}

impl PresentedToken {
    fn new(value: String, source: TokenSource) -> Self {
        Self {
            value: Zeroizing::new(value),
            source,
        }
    }

    fn missing() -> Self {
        Self::new(String::new(), TokenSource::Missing)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> TokenSource {
        self.source
    }
}

impl std::fmt::Debug for PresentedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentedToken")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim().to_string())
    } else {
        None
    }
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TOKEN_HEADER)?
        .to_str()
        .ok()
        .map(|s| s.trim().to_string())
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    Some(
        value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase(),
    )
}

/// `application/json` or any `application/*+json`, as axum's `Json` accepts
fn is_json(content_type: &str) -> bool {
    content_type
        .strip_prefix("application/")
        .is_some_and(|subtype| subtype == "json" || subtype.ends_with("+json"))
}

#[async_trait]
impl<S> FromRequest<S> for PresentedToken
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let headers = req.headers();

        if let Some(token) = bearer_token(headers) {
            return Ok(Self::new(token, TokenSource::Bearer));
        }
        if let Some(token) = header_token(headers) {
            return Ok(Self::new(token, TokenSource::Header));
        }

        // query is read before the body consumes the request
        let query_token = Query::<TokenField>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(field)| field.token);

        let body_token = if req.method() == Method::GET || req.method() == Method::HEAD {
            None
        } else {
            match content_type(req.headers()).as_deref() {
                Some("application/x-www-form-urlencoded") => {
                    match Form::<TokenField>::from_request(req, state).await {
                        Ok(Form(field)) => field.token,
                        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                            return Err(rejection.into_response());
                        }
                        Err(_) => None,
                    }
                }
                Some(ct) if is_json(ct) => match Json::<TokenField>::from_request(req, state).await {
                    Ok(Json(field)) => field.token,
                    Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                        return Err(rejection.into_response());
                    }
                    Err(_) => None,
                },
                _ => None,
            }
        };

        Ok(match (body_token, query_token) {
            (Some(token), _) => Self::new(token, TokenSource::Body),
            (None, Some(token)) => Self::new(token, TokenSource::Query),
            (None, None) => Self::missing(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn extract(req: Request) -> PresentedToken {
        PresentedToken::from_request(req, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_bearer_wins() {
        let req = Request::builder()
            .method("POST")
            .uri("/trigger?token=from-query")
            .header("authorization", "Bearer from-bearer")
            .header(TOKEN_HEADER, "from-header")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"token":"from-body"}"#))
            .unwrap();

        let token = extract(req).await;
        assert_eq!(token.as_str(), "from-bearer");
        assert_eq!(token.source(), TokenSource::Bearer);
    }

    #[tokio::test]
    async fn test_header_before_body() {
        let req = Request::builder()
            .method("POST")
            .uri("/trigger")
            .header(TOKEN_HEADER, "from-header")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("token=from-body"))
            .unwrap();

        let token = extract(req).await;
        assert_eq!(token.as_str(), "from-header");
        assert_eq!(token.source(), TokenSource::Header);
    }

    #[tokio::test]
    async fn test_form_body_before_query() {
        let req = Request::builder()
            .method("POST")
            .uri("/trigger?token=from-query")
            .header("content-type", "application/x-www-form-urlencoded; charset=utf-8")
            .body(Body::from("token=job-search-2025"))
            .unwrap();

        let token = extract(req).await;
        assert_eq!(token.as_str(), "job-search-2025");
        assert_eq!(token.source(), TokenSource::Body);
    }

    #[tokio::test]
    async fn test_query_on_get() {
        let req = Request::builder()
            .uri("/trigger?token=job-search-2025")
            .body(Body::empty())
            .unwrap();

        let token = extract(req).await;
        assert_eq!(token.as_str(), "job-search-2025");
        assert_eq!(token.source(), TokenSource::Query);
    }

    #[tokio::test]
    async fn test_malformed_json_counts_as_missing() {
        let req = Request::builder()
            .method("POST")
            .uri("/trigger")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let token = extract(req).await;
        assert_eq!(token.as_str(), "");
        assert_eq!(token.source(), TokenSource::Missing);
    }

    #[tokio::test]
    async fn test_json_suffix_media_type() {
        let req = Request::builder()
            .method("POST")
            .uri("/trigger")
            .header("content-type", "application/vnd.api+json")
            .body(Body::from(r#"{"token":"job-search-2025"}"#))
            .unwrap();

        let token = extract(req).await;
        assert_eq!(token.as_str(), "job-search-2025");
        assert_eq!(token.source(), TokenSource::Body);
    }

    #[test]
    fn test_is_json() {
        assert!(is_json("application/json"));
        assert!(is_json("application/problem+json"));
        assert!(!is_json("application/jsonx"));
        assert!(!is_json("text/json"));
        assert!(!is_json("application/x-www-form-urlencoded"));
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_ignored() {
        let req = Request::builder()
            .uri("/trigger")
            .header("authorization", "Basic Zm9vOmJhcg==")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract(req).await.source(), TokenSource::Missing);
    }

    #[test]
    fn test_debug_hides_value() {
        let token = PresentedToken::new("job-search-2025".into(), TokenSource::Body);
        assert!(!format!("{:?}", token).contains("job-search-2025"));
    }
}
