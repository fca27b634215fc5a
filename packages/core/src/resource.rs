//! A mapped value graph: path resolution, locking and per-shape dispatch.
//!
//! A [`Resource`] owns the reader/writer lock guarding everything reachable
//! from its root. Requests are classified before the lock is touched:
//!
//! | Class | Methods | Lock |
//! |-------|---------|------|
//! | safe | `GET`, `HEAD` | shared |
//! | unsafe | `POST`, `PUT`, `PATCH`, `DELETE` | exclusive; refused up front when read-only |
//! | metadata | `OPTIONS` | none |
//! | blocked | `CONNECT` | none |
//! | unrecognized | anything else | none |
//!
//! Once resolved, the target's shape decides what is allowed:
//!
//! | Shape | Allowed |
//! |-------|---------|
//! | scalar | `GET`, `HEAD`, `PUT` |
//! | sequence, map | `GET`, `HEAD`, `PUT`, `POST` |
//! | record | `GET`, `HEAD`, `PUT` (partial update) |
//! | unsupported | nothing |

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::codec::Codecs;
use crate::error::Error;
use crate::media::MediaTypeList;
use crate::message::{Request, Response, Status};
use crate::method::{allow_header, Method, MethodClass, MUTABLE_ALLOW, READ_ONLY_ALLOW};
use crate::node::{child, child_mut, concrete, concrete_mut, Node, Shape, ViewMut};

pub struct Resource {
    prefix: String,
    root: Arc<RwLock<dyn Node>>,
    read_only: AtomicBool,
    type_name: &'static str,
}

impl Resource {
    pub(crate) fn new(
        prefix: String,
        root: Arc<RwLock<dyn Node>>,
        read_only: bool,
        type_name: &'static str,
    ) -> Self {
        Self {
            prefix,
            root,
            read_only: AtomicBool::new(read_only),
            type_name,
        }
    }

    /// The normalized path prefix, always ending in `/`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Type name of the mapped root value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Refuse unsafe methods from now on. There is no way back.
    pub fn set_read_only(&self) {
        self.read_only.store(true, Ordering::Release);
    }

    pub fn allowed_methods(&self) -> &'static [Method] {
        if self.is_read_only() {
            READ_ONLY_ALLOW
        } else {
            MUTABLE_ALLOW
        }
    }

    /// Take the shared lock. A lock poisoned by a panicking writer is recovered.
    pub fn read(&self) -> RwLockReadGuard<'_, dyn Node + 'static> {
        self.root.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the exclusive lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, dyn Node + 'static> {
        self.root.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve one request whose path lies under this resource's prefix.
    ///
    /// The lock is held from before path resolution until the response body
    /// has been produced, and released on every exit path including panics.
    pub fn handle(&self, request: &Request, codecs: &Codecs) -> Result<Response, Error> {
        match request.method.class() {
            MethodClass::Metadata => Ok(Response::new(Status::Ok)
                .header("Allow", allow_header(self.allowed_methods()))),
            MethodClass::Unrecognized => {
                Err(Error::UnrecognizedMethod(request.method.to_string()))
            }
            MethodClass::Blocked => Err(Error::MethodNotAllowed {
                path: request.path.clone(),
                method: request.method.clone(),
                type_name: self.type_name,
            }),
            MethodClass::Unsafe => {
                if self.is_read_only() {
                    tracing::info!(
                        "refused {} {}: {} is read-only",
                        request.method,
                        request.path,
                        self.prefix
                    );
                    return Err(Error::ReadOnly(self.prefix.clone()));
                }
                isolate(|| {
                    let mut root = self.write();
                    self.serve_write(&mut *root, request, codecs)
                })
            }
            MethodClass::Safe => isolate(|| {
                let root = self.read();
                self.serve_read(&*root, request, codecs)
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Path resolution
    // -----------------------------------------------------------------------

    /// Walk `path` from `root`, unwrapping indirections at every step.
    ///
    /// The returned node may itself be an indirection.
    pub fn resolve<'a>(&self, root: &'a dyn Node, path: &str) -> Result<&'a dyn Node, Error> {
        let segments = self.segments(path)?;
        let mut node = root;
        for (i, segment) in segments.iter().enumerate() {
            let current =
                concrete(node).ok_or_else(|| self.no_sub_entity(&segments, i, node.type_name()))?;
            node = child(current, segment)
                .ok_or_else(|| self.no_sub_entity(&segments, i, current.type_name()))?;
        }
        Ok(node)
    }

    /// Mutable counterpart of [`Resource::resolve`].
    pub fn resolve_mut<'a>(
        &self,
        root: &'a mut dyn Node,
        path: &str,
    ) -> Result<&'a mut dyn Node, Error> {
        let segments = self.segments(path)?;
        let mut node = root;
        for (i, segment) in segments.iter().enumerate() {
            let type_name = node.type_name();
            let current = concrete_mut(node)
                .ok_or_else(|| self.no_sub_entity(&segments, i, type_name))?;
            let type_name = current.type_name();
            node = child_mut(current, segment)
                .ok_or_else(|| self.no_sub_entity(&segments, i, type_name))?;
        }
        Ok(node)
    }

    fn segments<'p>(&self, path: &'p str) -> Result<Vec<&'p str>, Error> {
        let rest = path
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| Error::Misdirected {
                path: path.to_string(),
                prefix: self.prefix.clone(),
            })?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Vec::new());
        }
        Ok(rest.split('/').collect())
    }

    fn no_sub_entity(&self, segments: &[&str], failed: usize, type_name: &'static str) -> Error {
        Error::NoSubEntity {
            resource: self.prefix.clone(),
            sub_path: segments[..=failed].join("/"),
            type_name,
        }
    }

    // -----------------------------------------------------------------------
    // Per-shape handling
    // -----------------------------------------------------------------------

    fn serve_read(
        &self,
        root: &dyn Node,
        request: &Request,
        codecs: &Codecs,
    ) -> Result<Response, Error> {
        let resolved = self.resolve(root, &request.path)?;
        let target = concrete(resolved).unwrap_or(resolved);
        self.permit(target, request)?;
        represent(target, Status::Ok, request, codecs)
    }

    fn serve_write(
        &self,
        root: &mut dyn Node,
        request: &Request,
        codecs: &Codecs,
    ) -> Result<Response, Error> {
        let resolved = self.resolve_mut(root, &request.path)?;
        self.permit(concrete(&*resolved).unwrap_or(&*resolved), request)?;

        let codec = codecs.for_content_type(request.content_type.as_deref())?;
        let doc = codec.decode(&request.body)?;

        if request.method == Method::Post {
            return self.add(resolved, doc, request, codecs);
        }
        resolved.replace(doc)?;
        represent(concrete(&*resolved).unwrap_or(&*resolved), Status::Ok, request, codecs)
    }

    // Append to a sequence or merge into a map.
    fn add(
        &self,
        node: &mut dyn Node,
        doc: Value,
        request: &Request,
        codecs: &Codecs,
    ) -> Result<Response, Error> {
        let type_name = node.type_name();
        let Some(target) = concrete_mut(node) else {
            return Err(self.not_allowed(request, type_name));
        };
        let location = match target.view_mut() {
            ViewMut::Sequence(seq) => {
                let index = seq.append(doc)?;
                Some(format!("{}/{index}", request.path.trim_end_matches('/')))
            }
            ViewMut::Map(map) => {
                map.insert(doc)?;
                None
            }
            _ => return Err(self.not_allowed(request, type_name)),
        };
        let response = represent(&*target, Status::Created, request, codecs)?;
        Ok(match location {
            Some(location) => response.header("Location", location),
            None => response,
        })
    }

    // Whether the target's shape accepts the request method.
    fn permit(&self, target: &dyn Node, request: &Request) -> Result<(), Error> {
        let shape = target.shape();
        if shape == Shape::Unsupported {
            return Err(Error::UnhandledType {
                path: request.path.clone(),
                type_name: target.type_name(),
            });
        }
        let allowed = match request.method {
            Method::Get | Method::Head | Method::Put => true,
            Method::Post => matches!(shape, Shape::Sequence | Shape::Map),
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(self.not_allowed(request, target.type_name()))
        }
    }

    fn not_allowed(&self, request: &Request, type_name: &'static str) -> Error {
        Error::MethodNotAllowed {
            path: request.path.clone(),
            method: request.method.clone(),
            type_name,
        }
    }
}

/// Encode `target` with the best codec the request accepts.
///
/// A zero-quality winner counts as refused.
fn represent(
    target: &dyn Node,
    status: Status,
    request: &Request,
    codecs: &Codecs,
) -> Result<Response, Error> {
    let available = codecs.available(target.shape());
    let requested = MediaTypeList::parse(&request.accept);
    let requested = if requested.is_empty() {
        MediaTypeList::any()
    } else {
        requested
    };

    let not_acceptable = || Error::NotAcceptable {
        available: available.to_string(),
    };
    let chosen = available
        .choose(&requested)
        .filter(|m| m.quality > 0.0)
        .ok_or_else(not_acceptable)?;
    let codec = codecs.for_media_type(&chosen).ok_or_else(not_acceptable)?;

    let body = codec.encode(target).map_err(|source| Error::Encode {
        media: chosen.essence(),
        type_name: target.type_name(),
        source,
    })?;

    let response = Response::new(status)
        .header("Content-Type", codec.media_type().essence())
        .header("Vary", "Accept")
        .header("Content-Length", body.len().to_string());
    if request.method == Method::Head {
        Ok(response)
    } else {
        Ok(response.with_body(body))
    }
}

// Run a locked handler, turning a panic into an error. Guards taken inside
// `handler` are dropped during unwinding, so the lock is already free here.
fn isolate<F>(handler: F) -> Result<Response, Error>
where
    F: FnOnce() -> Result<Response, Error>,
{
    panic::catch_unwind(AssertUnwindSafe(handler))
        .unwrap_or_else(|payload| Err(Error::HandlerPanic(panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// --- tests -------------------------------------------------------------------
