use anyhow::Result;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

pub mod reqwest_client;

pub use reqwest_client::ReqwestHttpClient;

/// The network boundary. Every call the crate makes goes through one of these.
///
/// A received response is always `Ok`, whatever its status. `Err` means
/// nothing came back.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync + std::fmt::Debug + 'static {
    async fn execute(&self, request: Request) -> Result<Response>;
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> serde_json::Result<Self> {
        let bytes = serde_json::to_vec(body)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Sets (or replaces) the bearer authorization header.
    ///
    /// A token that is not a valid header value is skipped, the request then
    /// goes out unauthenticated and the server's 401 takes over.
    pub fn bearer(mut self, token: &str) -> Self {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!("Access token is not a valid header value, sending without it");
                self.headers.remove(AUTHORIZATION);
            }
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_replaces_previous_token() {
        let url = Url::parse("https://api.example.test/classrooms").unwrap();
        let request = Request::get(url).bearer("old").bearer("new");
        assert_eq!(request.headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(request.headers[AUTHORIZATION], "Bearer new");
        assert!(request.headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_bearer_skips_invalid_token() {
        let url = Url::parse("https://api.example.test/classrooms").unwrap();
        let request = Request::get(url).bearer("bad\ntoken");
        assert!(request.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_with_json_sets_content_type() {
        let url = Url::parse("https://api.example.test/polls").unwrap();
        let request = Request::post(url)
            .with_json(&serde_json::json!({"question": "Ready?"}))
            .unwrap();
        assert_eq!(request.headers[CONTENT_TYPE], "application/json");
        assert_eq!(
            request.body.as_deref(),
            Some(br#"{"question":"Ready?"}"#.as_slice())
        );
    }
}
