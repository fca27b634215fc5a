//! Shared helpers for the restmap conformance test suite.
//!
//! Provides [`spawn_node`], which binds a `TcpListener` on an ephemeral port,
//! wires up an in-process node with the sample values mapped, and returns both
//! the local URL and the handles to the mutable values so tests can check
//! state without going through the HTTP layer.

use std::net::SocketAddr;
use std::sync::Arc;

use restmap::Registry;
use restmap_node::{build_router, sample::{self, Mounted}};

/// Start an ephemeral in-process node and return `(base_url, registry, handles)`.
///
/// The node runs in a background `tokio` task bound to an OS-assigned port on
/// `127.0.0.1`. The returned `String` is the base URL, e.g.
/// `http://127.0.0.1:51234`. The registry is shared with the node, so tests
/// may map extra values after startup.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound or the node fails to start.
pub async fn spawn_node() -> (String, Arc<Registry>, Mounted) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}");

    let registry = Arc::new(Registry::new());
    let mounted = sample::mount(&registry).expect("map sample values");
    let router = build_router(Arc::clone(&registry));

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("conformance node error");
    });

    (base_url, registry, mounted)
}
