//! Node configuration, populated from environment variables.

use std::net::SocketAddr;

/// Runtime configuration for a restmap node.
///
/// All fields are populated from environment variables with sensible
/// defaults, so a node can be started with zero configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `RESTMAP_BIND` | `0.0.0.0:3000` | TCP socket address to listen on |
/// | `RESTMAP_SAMPLE` | `true` | Map the sample value graph at startup |
/// | `RESTMAP_MAX_BODY_BYTES` | `1048576` | Largest request body accepted |
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    /// Whether to map the sample values (`/mutable`, `/readonly`, `/int`, `/str`).
    pub sample: bool,

    /// Request bodies larger than this are rejected with 413.
    pub max_body_bytes: usize,
}

impl NodeConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = std::env::var("RESTMAP_BIND")
            .unwrap_or_else(|_| "0.0.0.0:3000".into())
            .parse()
            .expect("RESTMAP_BIND must be a valid socket address (e.g. 0.0.0.0:3000)");

        let sample = std::env::var("RESTMAP_SAMPLE")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        let max_body_bytes = std::env::var("RESTMAP_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1024 * 1024);

        Self {
            bind_addr,
            sample,
            max_body_bytes,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            sample: true,
            max_body_bytes: 1024 * 1024,
        }
    }
}

// Anything but an explicit "off" keeps the default.
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
