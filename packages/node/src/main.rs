//! `restmap-node`: serves restmap value graphs over HTTP.
//!
//! # Quick start
//!
//! ```sh
//! # Sample values on the default port:
//! restmap-node
//! curl localhost:3000/mutable/numbers/2
//!
//! # Custom bind address, larger bodies:
//! RESTMAP_BIND=127.0.0.1:8080 RESTMAP_MAX_BODY_BYTES=4194304 restmap-node
//! ```
//!
//! # Environment variables
//!
//! See [`restmap_node::NodeConfig::from_env`] for the full list.

use std::net::SocketAddr;
use std::sync::Arc;

use restmap::Registry;
use restmap_node::{router, sample, NodeConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "restmap=info,restmap_node=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = NodeConfig::from_env();

    let registry = Arc::new(Registry::new());
    if config.sample {
        sample::mount(&registry).expect("failed to map the sample values");
    } else {
        tracing::info!("sample values disabled; nothing is mapped");
    }

    let app = router::build_router_with(registry, &config);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.bind_addr));

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
