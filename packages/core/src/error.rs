//! Error taxonomy for request handling.
//!
//! Every failure the core can produce is a variant of [`Error`], and every
//! variant maps to exactly one [`Status`] via [`Error::status`]. Nothing here
//! is fatal: the dispatcher logs the error and the transport turns it into a
//! response.

use thiserror::Error;

use crate::codec::CodecError;
use crate::message::Status;
use crate::method::Method;
use crate::node::DecodeError;

/// Errors returned while mapping, routing, or serving a request.
#[derive(Debug, Error)]
pub enum Error {
    /// The resolved value has a shape with no request handling.
    #[error("{path}: unhandled type {type_name}")]
    UnhandledType {
        path: String,
        type_name: &'static str,
    },

    /// The method is not valid for the resolved value's shape.
    #[error("{method} unsupported for {type_name}")]
    MethodNotAllowed {
        path: String,
        method: Method,
        type_name: &'static str,
    },

    /// A path segment could not be resolved under the current value.
    #[error("{resource} ({type_name}) has no sub-entity {sub_path:?}")]
    NoSubEntity {
        resource: String,
        sub_path: String,
        type_name: &'static str,
    },

    /// The chosen codec could not represent the target value.
    #[error("encoding {type_name} as {media}: {source}")]
    Encode {
        media: String,
        type_name: &'static str,
        #[source]
        source: CodecError,
    },

    /// An unsafe method was attempted against a read-only resource.
    #[error("read-only resource {0}")]
    ReadOnly(String),

    /// The dispatcher handed a resource a path outside its prefix.
    #[error("misdirected request: {path} is not under {prefix}")]
    Misdirected { path: String, prefix: String },

    /// The method is not a known HTTP verb.
    #[error("unknown method: {0}")]
    UnrecognizedMethod(String),

    /// No resource is mapped at any prefix of the path.
    #[error("no resource mapped for {0}")]
    NoResource(String),

    /// None of the available representations satisfies the request.
    #[error("none of [{available}] is acceptable")]
    NotAcceptable { available: String },

    /// The request body's content type has no codec.
    #[error("unsupported content type {0}")]
    UnsupportedMediaType(String),

    /// The request body could not be decoded or applied to the target.
    #[error("bad request body: {0}")]
    BadRequest(#[from] DecodeError),

    /// A resource is already mapped at this prefix.
    #[error("{0} is already mapped")]
    Conflict(String),

    /// The handler panicked; the lock was released and the request dropped.
    #[error("request handler panicked: {0}")]
    HandlerPanic(String),
}

impl Error {
    /// The status class this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Error::UnhandledType { .. } => Status::NotImplemented,
            Error::MethodNotAllowed { .. } => Status::MethodNotAllowed,
            Error::NoSubEntity { .. } => Status::NotFound,
            Error::Encode { .. } => Status::InternalError,
            Error::ReadOnly(_) => Status::Forbidden,
            Error::Misdirected { .. } => Status::InternalError,
            Error::UnrecognizedMethod(_) => Status::NotImplemented,
            Error::NoResource(_) => Status::NotFound,
            Error::NotAcceptable { .. } => Status::NotAcceptable,
            Error::UnsupportedMediaType(_) => Status::UnsupportedMediaType,
            Error::BadRequest(_) => Status::BadRequest,
            Error::Conflict(_) => Status::Conflict,
            Error::HandlerPanic(_) => Status::InternalError,
        }
    }

    /// Machine-readable code for error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnhandledType { .. } => "unhandled_type",
            Error::MethodNotAllowed { .. } => "method_not_allowed",
            Error::NoSubEntity { .. } => "not_found",
            Error::Encode { .. } => "encode_failed",
            Error::ReadOnly(_) => "read_only",
            Error::Misdirected { .. } => "misdirected_request",
            Error::UnrecognizedMethod(_) => "not_implemented",
            Error::NoResource(_) => "not_found",
            Error::NotAcceptable { .. } => "not_acceptable",
            Error::UnsupportedMediaType(_) => "unsupported_media_type",
            Error::BadRequest(_) => "invalid_body",
            Error::Conflict(_) => "conflict",
            Error::HandlerPanic(_) => "internal_error",
        }
    }
}
