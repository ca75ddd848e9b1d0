use std::future::Future;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::errors::Error;

/// A request as the caller describes it. Credentials are never stored here;
/// the gateway supplies them per attempt.
#[derive(Clone, Debug)]
pub struct OutgoingRequest {
    pub target: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl OutgoingRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(Method::PATCH, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, Error> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Target path without query string or fragment.
    pub fn path(&self) -> &str {
        self.target
            .split(['?', '#'])
            .next()
            .unwrap_or(self.target.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Wire primitive wrapped by the gateway. `bearer` is attached as an
/// `Authorization: Bearer` header when present.
pub trait Transport: Send + Sync + 'static {
    fn dispatch(
        &self,
        request: &OutgoingRequest,
        bearer: Option<&str>,
    ) -> impl Future<Output = Result<TransportResponse, Error>> + Send;
}

pub struct HttpTransport {
    client: Client,
    base: Url,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(client: Client, base: Url, timeout: Option<Duration>) -> Self {
        Self {
            client,
            base,
            timeout,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, Error> {
        let client = build_client(config)?;
        Ok(Self::new(client, config.base()?, config.request_timeout()))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url_for(&self, target: &str) -> Result<Url, Error> {
        join_target(&self.base, target)
    }
}

pub(crate) fn build_client(config: &GatewayConfig) -> Result<Client, Error> {
    let mut headers = HeaderMap::new();
    let agent = HeaderValue::from_str(&config.user_agent)
        .map_err(|e| Error::Config(format!("Invalid user agent '{}': {}", config.user_agent, e)))?;
    headers.insert(USER_AGENT, agent);
    Ok(Client::builder().default_headers(headers).build()?)
}

/// Joins a request target onto the base URL, keeping any base path prefix.
pub(crate) fn join_target(base: &Url, target: &str) -> Result<Url, Error> {
    if target.contains("://") {
        return Url::parse(target)
            .map_err(|e| Error::Config(format!("Invalid request target '{}': {}", target, e)));
    }
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        target.trim_start_matches('/')
    );
    Url::parse(&joined)
        .map_err(|e| Error::Config(format!("Invalid request target '{}': {}", target, e)))
}

impl Transport for HttpTransport {
    async fn dispatch(
        &self,
        request: &OutgoingRequest,
        bearer: Option<&str>,
    ) -> Result<TransportResponse, Error> {
        let url = self.url_for(&request.target)?;
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder.send().await.map_err(|err| match self.timeout {
            Some(after) if err.is_timeout() => Error::Timeout(after),
            _ => Error::Transport(err),
        })?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?.to_vec();
        debug!(
            method = %request.method,
            target = %request.path(),
            status = status.as_u16(),
            body_len = body.len(),
            "transport.response"
        );
        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
