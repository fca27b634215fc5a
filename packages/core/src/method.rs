//! Request methods and their locking classes.

use std::fmt;
use std::str::FromStr;

/// An HTTP-style request method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Head,
    Get,
    Post,
    Patch,
    Put,
    Delete,
    Connect,
    /// Any verb the core does not recognize. Kept verbatim for diagnostics.
    Other(String),
}

/// How the dispatcher treats a method before the resource sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    /// Reads only; takes the shared lock.
    Safe,
    /// May mutate; takes the exclusive lock and is refused on read-only resources.
    Unsafe,
    /// Reports allowed methods; takes no lock.
    Metadata,
    /// Known but never served.
    Blocked,
    Unrecognized,
}

/// Methods advertised by a mutable resource, in `Allow` header order.
pub const MUTABLE_ALLOW: &[Method] = &[
    Method::Options,
    Method::Head,
    Method::Get,
    Method::Post,
    Method::Patch,
    Method::Put,
    Method::Delete,
];

/// Methods advertised by a read-only resource.
pub const READ_ONLY_ALLOW: &[Method] = &[Method::Options, Method::Head, Method::Get];

impl Method {
    pub fn class(&self) -> MethodClass {
        match self {
            Method::Get | Method::Head => MethodClass::Safe,
            Method::Post | Method::Put | Method::Patch | Method::Delete => MethodClass::Unsafe,
            Method::Options => MethodClass::Metadata,
            Method::Connect => MethodClass::Blocked,
            Method::Other(_) => MethodClass::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Other(m) => m,
        }
    }
}

/// Render a method set as an `Allow` header value.
pub fn allow_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Method {
    // Method names are case-sensitive.
    fn from(s: &str) -> Self {
        match s {
            "OPTIONS" => Method::Options,
            "HEAD" => Method::Head,
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PATCH" => Method::Patch,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "CONNECT" => Method::Connect,
            other => Method::Other(other.to_string()),
        }
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Method::from(s))
    }
}
