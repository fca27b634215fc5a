//! Serve in-memory Rust values as RESTful resources.
//!
//! A value graph is mapped at a path prefix in a [`Registry`]. Requests are
//! routed to the resource with the longest matching prefix, resolved segment
//! by segment through the value adapter, and answered in the best media type
//! both sides accept. Each resource carries its own reader/writer lock.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`node`] | The value adapter: [`Node`], tagged [`View`]s, the [`record!`] macro |
//! | [`resource`] | Path resolution, method classes and per-shape dispatch for one [`Resource`] |
//! | [`registry`] | Prefix routing and the [`Registry::dispatch`] entry point |
//! | [`media`] | [`MediaType`] parsing, ordering, filtering and choice |
//! | [`codec`] | [`JsonCodec`], [`TextCodec`] and the [`Codecs`] set |
//! | [`message`] | Transport-neutral [`Request`] and [`Response`] |
//! | [`method`] | [`Method`] and its locking [`MethodClass`] |
//! | [`error`] | [`Error`] and its status mapping |
//!
//! # Quick start
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::{Arc, RwLock};
//!
//! use restmap::{Registry, Request};
//!
//! struct Sample {
//!     string: String,
//!     numbers: Vec<i64>,
//!     map: HashMap<String, bool>,
//! }
//!
//! restmap::record!(Sample {
//!     string as "String",
//!     numbers as "Numbers",
//!     map as "Map",
//! });
//!
//! let registry = Registry::new();
//! let sample = Arc::new(RwLock::new(Sample {
//!     string: "teststr".into(),
//!     numbers: vec![6, 9, 42],
//!     map: HashMap::new(),
//! }));
//! registry.map("/mutable", sample).unwrap();
//!
//! let response = registry.dispatch(&Request::new("GET", "/mutable/numbers/2")).unwrap();
//! assert_eq!(response.text(), "42");
//! ```

pub mod codec;
pub mod error;
pub mod media;
pub mod message;
pub mod method;
pub mod node;
pub mod registry;
pub mod resource;

#[cfg(test)]
mod fixtures;

pub use codec::{Codec, CodecError, Codecs, Encoded, JsonCodec, TextCodec};
pub use error::Error;
pub use media::{MediaType, MediaTypeError, MediaTypeList};
pub use message::{Request, Response, Status};
pub use method::{Method, MethodClass};
pub use node::{Assign, DecodeError, KeyedMap, Node, Record, Scalar, Sequence, Shape, View, ViewMut};
pub use registry::Registry;
pub use resource::Resource;
