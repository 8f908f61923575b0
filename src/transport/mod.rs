//! Outbound transport shapes the probe knows how to intercept, with
//! reqwest-backed default implementations, and the registry through which
//! host code reaches them.
//!
//! Each shape has a different completion mechanism:
//!
//! - [`FetchTransport`]: a single future.
//! - [`EventObject`]: open/send mutators plus assignable handler slots.
//! - [`SocketRequestApi`]: completion callback plus a live request object
//!   that reports errors to listeners.
//! - [`InterceptorClient`]: ordered request/response interceptors.

pub mod chain;
pub mod event_object;
pub mod fetch;
pub mod registry;
pub mod socket;

pub use chain::{
    ChainRequest, ChainResponse, InterceptorClient, InterceptorId, RequestInterceptor,
    ResponseInterceptor,
};
pub use event_object::{
    ErrorHandler, EventObject, EventObjectFactory, EventResponse, HttpEventObjectFactory,
    LoadHandler,
};
pub use fetch::{FetchRequest, FetchResponse, FetchTransport, ReqwestFetch};
pub use registry::{RegistryBuilder, TransportRegistry};
pub use socket::{
    ClientRequest, RequestErrorListener, ReqwestSocketApi, ResponseCallback, SocketRequestApi,
    SocketResponse,
};

use http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Which transport an adapter is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Fetch,
    SocketRequest,
    EventObject,
    InterceptorChain,
}

/// Failure as observed by the host. Propagated untouched by every adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request aborted")]
    Aborted,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

pub type Headers = Vec<(String, String)>;

// ─── Request descriptions ────────────────────────────────────────

/// Node-style options bag describing where a request goes.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    /// Scheme with trailing colon, e.g. `"http:"`.
    pub protocol: String,
    pub host: String,
    pub port: Option<u16>,
    /// Path plus optional query, starting with `/`.
    pub path: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

impl RequestOptions {
    pub fn new(method: Method, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            protocol: "http:".into(),
            host: host.into(),
            port: None,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Split a parsed URL into an options bag.
    pub fn from_url(method: Method, url: &Url) -> Self {
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Self {
            method,
            protocol: format!("{}:", url.scheme()),
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port(),
            path,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn to_url_string(&self) -> String {
        let protocol = if self.protocol.ends_with(':') {
            self.protocol.clone()
        } else {
            format!("{}:", self.protocol)
        };
        let path = if self.path.is_empty() { "/" } else { self.path.as_str() };
        match self.port {
            Some(port) => format!("{protocol}//{}:{port}{path}", self.host),
            None => format!("{protocol}//{}{path}", self.host),
        }
    }
}

/// The three shapes a call's destination may arrive in.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestTarget {
    Raw(String),
    Parsed(Url),
    Options(RequestOptions),
}

impl RequestTarget {
    pub fn to_url_string(&self) -> String {
        match self {
            Self::Raw(s) => s.clone(),
            Self::Parsed(url) => url.to_string(),
            Self::Options(opts) => opts.to_url_string(),
        }
    }
}

impl From<&str> for RequestTarget {
    fn from(s: &str) -> Self {
        Self::Raw(s.to_string())
    }
}

impl From<String> for RequestTarget {
    fn from(s: String) -> Self {
        Self::Raw(s)
    }
}

impl From<Url> for RequestTarget {
    fn from(url: Url) -> Self {
        Self::Parsed(url)
    }
}

impl From<RequestOptions> for RequestTarget {
    fn from(opts: RequestOptions) -> Self {
        Self::Options(opts)
    }
}
