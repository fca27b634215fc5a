//! Public surface for the `restmap-node` crate.
//!
//! Exposes the router builder, config and the sample value graph so that
//! external crates (e.g. the conformance test suite) can spin up an
//! in-process node without spawning a subprocess.

pub mod config;
pub mod error;
pub mod router;
pub mod sample;

pub use config::NodeConfig;
pub use router::build_router;
