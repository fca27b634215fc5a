//! Transport-neutral request and response types.
//!
//! A transport binding (see the `restmap-node` crate) converts its own request
//! type into a [`Request`], hands it to [`Registry::dispatch`], and writes the
//! resulting [`Response`] back out.
//!
//! [`Registry::dispatch`]: crate::Registry::dispatch

use std::fmt;

use crate::method::Method;

/// Status classes the core can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Created,
    BadRequest,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    Conflict,
    UnsupportedMediaType,
    InternalError,
    NotImplemented,
}

impl Status {
    /// The numeric HTTP status code.
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::NotAcceptable => 406,
            Status::Conflict => 409,
            Status::UnsupportedMediaType => 415,
            Status::InternalError => 500,
            Status::NotImplemented => 501,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One inbound request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Decoded request path, e.g. `/mutable/numbers/2`.
    pub path: String,
    /// Raw `Accept` header values, in the order received.
    pub accept: Vec<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Peer address, used only for diagnostics.
    pub remote: Option<String>,
}

impl Request {
    pub fn new(method: impl Into<Method>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            accept: Vec::new(),
            content_type: None,
            body: Vec::new(),
            remote: None,
        }
    }

    /// Add one raw `Accept` header value.
    pub fn accept(mut self, value: impl Into<String>) -> Self {
        self.accept.push(value.into());
        self
    }

    /// Attach a body with its content type.
    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = body.into();
        self
    }

    pub fn remote(mut self, addr: impl Into<String>) -> Self {
        self.remote = Some(addr.into());
        self
    }
}

/// A successful response produced by a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: Status,
    pub headers: Vec<(&'static str, String)>,
    /// `None` for responses that carry no body at all (HEAD, OPTIONS).
    pub body: Option<Vec<u8>>,
}

impl Response {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// First value of header `name` (ASCII case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body as UTF-8 text, or `""` when absent or not text.
    pub fn text(&self) -> &str {
        self.body
            .as_deref()
            .and_then(|b| std::str::from_utf8(b).ok())
            .unwrap_or("")
    }
}
