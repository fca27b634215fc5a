//! The resource registry and request dispatcher.
//!
//! A [`Registry`] maps normalized path prefixes to [`Resource`]s and routes
//! each [`Request`] to the resource with the longest matching prefix. There is
//! no global table: transports hold the registry behind an `Arc` and call
//! [`Registry::dispatch`] from as many threads as they like.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::codec::Codecs;
use crate::error::Error;
use crate::message::{Request, Response};
use crate::node::Node;
use crate::resource::Resource;

pub struct Registry {
    resources: RwLock<BTreeMap<String, Arc<Resource>>>,
    codecs: Codecs,
}

impl Registry {
    /// A registry negotiating over the default codecs (JSON, then plain text).
    pub fn new() -> Self {
        Self::with_codecs(Codecs::default())
    }

    pub fn with_codecs(codecs: Codecs) -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            codecs,
        }
    }

    pub fn codecs(&self) -> &Codecs {
        &self.codecs
    }

    /// Map a mutable value at `path`.
    ///
    /// The caller keeps `handle` and must take its lock to touch the value
    /// while requests are being served.
    pub fn map<T: Node + 'static>(
        &self,
        path: &str,
        handle: Arc<RwLock<T>>,
    ) -> Result<Arc<Resource>, Error> {
        self.insert(path, handle, false, std::any::type_name::<T>())
    }

    /// Map an immutable snapshot at `path`. The resource is read-only.
    pub fn map_snapshot<T: Node + 'static>(
        &self,
        path: &str,
        value: T,
    ) -> Result<Arc<Resource>, Error> {
        self.insert(
            path,
            Arc::new(RwLock::new(value)),
            true,
            std::any::type_name::<T>(),
        )
    }

    fn insert(
        &self,
        path: &str,
        root: Arc<RwLock<dyn Node>>,
        read_only: bool,
        type_name: &'static str,
    ) -> Result<Arc<Resource>, Error> {
        let prefix = normalize(path);
        let mut resources = self.resources.write().unwrap_or_else(PoisonError::into_inner);
        if resources.contains_key(&prefix) {
            return Err(Error::Conflict(prefix));
        }
        let resource = Arc::new(Resource::new(prefix.clone(), root, read_only, type_name));
        resources.insert(prefix.clone(), Arc::clone(&resource));

        let access = if read_only { "read-only" } else { "mutable" };
        tracing::info!("mapped {type_name} at {prefix} ({access})");
        Ok(resource)
    }

    /// Mapped prefixes in sorted order.
    pub fn prefixes(&self) -> Vec<String> {
        let resources = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        resources.keys().cloned().collect()
    }

    /// The resource with the longest prefix covering `path`.
    ///
    /// A path equal to a prefix minus its trailing `/` is covered too.
    pub fn route(&self, path: &str) -> Option<Arc<Resource>> {
        let covered = with_trailing_slash(path);
        let resources = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        resources
            .iter()
            .filter(|(prefix, _)| covered.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, resource)| Arc::clone(resource))
    }

    /// Route and serve one request.
    ///
    /// Errors are logged here with the peer address, method and path, then
    /// returned for the transport to render.
    pub fn dispatch(&self, request: &Request) -> Result<Response, Error> {
        let result = self.serve(request);
        if let Err(e) = &result {
            let remote = request.remote.as_deref().unwrap_or("-");
            match e {
                Error::HandlerPanic(_) | Error::Misdirected { .. } => {
                    tracing::error!("{remote} {} {}: {e}", request.method, request.path)
                }
                _ => tracing::warn!("{remote} {} {}: {e}", request.method, request.path),
            }
        }
        result
    }

    fn serve(&self, request: &Request) -> Result<Response, Error> {
        let resource = self
            .route(&request.path)
            .ok_or_else(|| Error::NoResource(request.path.clone()))?;

        // `/mutable` addresses the root of `/mutable/`.
        if !request.path.starts_with(resource.prefix()) {
            let mut bare = request.clone();
            bare.path = resource.prefix().to_string();
            return resource.handle(&bare, &self.codecs);
        }
        resource.handle(request, &self.codecs)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a mapping path to start and end with `/`.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

fn with_trailing_slash(path: &str) -> std::borrow::Cow<'_, str> {
    if path.ends_with('/') {
        path.into()
    } else {
        format!("{path}/").into()
    }
}

// --- tests -------------------------------------------------------------------
