//! The value adapter: a shape-aware, borrowed view over native Rust values.
//!
//! Anything that can be exposed through a [`Resource`](crate::Resource)
//! implements [`Node`]. A node never describes itself through runtime type
//! inspection; it answers [`Node::view`] with an explicit tagged [`View`]:
//!
//! | Variant | Provided for |
//! |---------|--------------|
//! | [`View::Scalar`] | `bool`, integers, floats, `char`, `String` |
//! | [`View::Sequence`] | `Vec<T>` |
//! | [`View::Map`] | `HashMap`/`BTreeMap` keyed by `String` (traversable) or by integers (not traversable) |
//! | [`View::Record`] | structs declared with [`record!`](crate::record) |
//! | [`View::Indirect`] | `Box`, `Arc`, `Option` |
//! | [`View::Unsupported`] | `()` |
//!
//! Indirections are never followed implicitly. Traversal calls [`concrete`]
//! (or [`concrete_mut`]) at every boundary, and a `None` indirection ends the
//! walk instead of faulting.
//!
//! Writes go through decoded documents ([`serde_json::Value`]): scalars and
//! collections deserialize the document into their native type, records
//! apply it field by field.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::codec::Encoded;

/// Errors raised while applying a decoded document to a node.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("expected an object")]
    NotAnObject,

    #[error("no single field matches {0:?}")]
    UnknownField(String),

    #[error("target value is absent")]
    Absent,

    #[error("{0} cannot be assigned")]
    Unassignable(&'static str),
}

/// Structural category of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Sequence,
    Map,
    Record,
    /// Only observed before indirections are unwrapped.
    Indirect,
    Unsupported,
}

/// A borrowed scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(char),
    Str(&'a str),
}

impl fmt::Display for Scalar<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Uint(u) => write!(f, "{u}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Char(c) => write!(f, "{c}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// Read-only view of one node.
pub enum View<'a> {
    Scalar(Scalar<'a>),
    Sequence(&'a dyn Sequence),
    Map(&'a dyn KeyedMap),
    Record(&'a dyn Record),
    /// A pointer-like wrapper; `None` is a null indirection.
    Indirect(Option<&'a dyn Node>),
    Unsupported,
}

/// Mutable view of one node.
pub enum ViewMut<'a> {
    Scalar(&'a mut dyn Assign),
    Sequence(&'a mut dyn Sequence),
    Map(&'a mut dyn KeyedMap),
    Record(&'a mut dyn Record),
    Indirect(Option<&'a mut dyn Node>),
    Unsupported,
}

impl View<'_> {
    pub fn shape(&self) -> Shape {
        match self {
            View::Scalar(_) => Shape::Scalar,
            View::Sequence(_) => Shape::Sequence,
            View::Map(_) => Shape::Map,
            View::Record(_) => Shape::Record,
            View::Indirect(_) => Shape::Indirect,
            View::Unsupported => Shape::Unsupported,
        }
    }
}

/// A value that can be exposed and traversed.
pub trait Node: Send + Sync {
    fn view(&self) -> View<'_>;

    fn view_mut(&mut self) -> ViewMut<'_>;

    /// Name of the concrete type, used in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn shape(&self) -> Shape {
        self.view().shape()
    }

    /// Replace the whole value with a decoded document.
    ///
    /// Records are updated field by field, so a document naming only some
    /// fields leaves the others untouched.
    fn replace(&mut self, doc: Value) -> Result<(), DecodeError> {
        let type_name = self.type_name();
        match self.view_mut() {
            ViewMut::Scalar(slot) => slot.assign(doc),
            ViewMut::Sequence(seq) => seq.replace(doc),
            ViewMut::Map(map) => map.replace(doc),
            ViewMut::Record(record) => record.update(doc),
            ViewMut::Indirect(Some(inner)) => inner.replace(doc),
            ViewMut::Indirect(None) => Err(DecodeError::Absent),
            ViewMut::Unsupported => Err(DecodeError::Unassignable(type_name)),
        }
    }
}

/// Whole-value assignment from a decoded document.
pub trait Assign {
    fn assign(&mut self, doc: Value) -> Result<(), DecodeError>;
}

impl<T: DeserializeOwned> Assign for T {
    fn assign(&mut self, doc: Value) -> Result<(), DecodeError> {
        *self = serde_json::from_value(doc)?;
        Ok(())
    }
}

/// An indexed collection.
pub trait Sequence: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<&dyn Node>;

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Node>;

    fn replace(&mut self, doc: Value) -> Result<(), DecodeError>;

    /// Append one decoded element, returning its index.
    fn append(&mut self, doc: Value) -> Result<usize, DecodeError>;
}

/// A keyed collection.
pub trait KeyedMap: Send + Sync {
    /// Whether keys are plain strings. Only string-keyed maps can be traversed.
    fn string_keyed(&self) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, keys rendered as strings.
    fn entries(&self) -> Box<dyn Iterator<Item = (Cow<'_, str>, &dyn Node)> + '_>;

    fn get(&self, key: &str) -> Option<&dyn Node>;

    fn get_mut(&mut self, key: &str) -> Option<&mut dyn Node>;

    fn replace(&mut self, doc: Value) -> Result<(), DecodeError>;

    /// Insert every entry of a decoded object, overwriting existing keys.
    fn insert(&mut self, doc: Value) -> Result<(), DecodeError>;
}

/// A struct-like value with named fields.
///
/// Usually implemented through [`record!`](crate::record).
pub trait Record: Send + Sync {
    /// Exposed field names, in declaration order.
    fn fields(&self) -> &'static [&'static str];

    /// Field by its exact exposed name.
    fn field(&self, name: &str) -> Option<&dyn Node>;

    fn field_mut(&mut self, name: &str) -> Option<&mut dyn Node>;

    /// Apply a decoded object field by field.
    ///
    /// Keys are matched case-insensitively. Every key is resolved before any
    /// field is written; an unknown or ambiguous key rejects the whole update.
    /// A value that fails to decode restores the fields already written, so a
    /// rejected update leaves the record as it was.
    fn update(&mut self, doc: Value) -> Result<(), DecodeError> {
        let Value::Object(entries) = doc else {
            return Err(DecodeError::NotAnObject);
        };
        let fields = self.fields();
        let mut resolved = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match match_field(fields, &key) {
                Some(name) => resolved.push((name, value)),
                None => return Err(DecodeError::UnknownField(key)),
            }
        }

        let mut written: Vec<(&'static str, Value)> = Vec::with_capacity(resolved.len());
        for (name, value) in resolved {
            let result = match self.field_mut(name) {
                Some(field) => serde_json::to_value(Encoded(&*field))
                    .map_err(DecodeError::from)
                    .and_then(|before| {
                        written.push((name, before));
                        field.replace(value)
                    }),
                None => Err(DecodeError::UnknownField(name.to_string())),
            };
            if let Err(e) = result {
                self.restore(written);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Put back field values captured by [`Record::update`], newest first.
    fn restore(&mut self, written: Vec<(&'static str, Value)>) {
        for (name, before) in written.into_iter().rev() {
            if let Some(field) = self.field_mut(name) {
                if let Err(e) = field.replace(before) {
                    tracing::error!("could not restore field {name}: {e}");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Traversal helpers
// ---------------------------------------------------------------------------

/// Follow indirections to the first concrete node.
///
/// Returns `None` when the chain ends in a null indirection.
pub fn concrete(node: &dyn Node) -> Option<&dyn Node> {
    let mut node = node;
    loop {
        match node.view() {
            View::Indirect(Some(inner)) => node = inner,
            View::Indirect(None) => return None,
            _ => return Some(node),
        }
    }
}

/// Mutable counterpart of [`concrete`].
pub fn concrete_mut(node: &mut dyn Node) -> Option<&mut dyn Node> {
    let mut node = node;
    loop {
        if node.shape() != Shape::Indirect {
            return Some(node);
        }
        match node.view_mut() {
            ViewMut::Indirect(Some(inner)) => node = inner,
            _ => return None,
        }
    }
}

/// Look up one path segment beneath a concrete node.
pub fn child<'a>(node: &'a dyn Node, segment: &str) -> Option<&'a dyn Node> {
    match node.view() {
        View::Sequence(seq) => parse_index(segment, seq.len()).and_then(|i| seq.get(i)),
        View::Map(map) if map.string_keyed() => map.get(segment),
        View::Record(record) => {
            match_field(record.fields(), segment).and_then(|name| record.field(name))
        }
        _ => None,
    }
}

/// Mutable counterpart of [`child`].
pub fn child_mut<'a>(node: &'a mut dyn Node, segment: &str) -> Option<&'a mut dyn Node> {
    match node.view_mut() {
        ViewMut::Sequence(seq) => {
            let index = parse_index(segment, seq.len())?;
            seq.get_mut(index)
        }
        ViewMut::Map(map) => {
            if map.string_keyed() {
                map.get_mut(segment)
            } else {
                None
            }
        }
        ViewMut::Record(record) => {
            let name = match_field(record.fields(), segment)?;
            record.field_mut(name)
        }
        _ => None,
    }
}

/// Case-insensitive exact field match. Zero or several matches is `None`.
pub fn match_field(fields: &[&'static str], segment: &str) -> Option<&'static str> {
    let wanted = segment.to_lowercase();
    let mut hits = fields
        .iter()
        .copied()
        .filter(|name| name.to_lowercase() == wanted);
    match (hits.next(), hits.next()) {
        (Some(name), None) => Some(name),
        _ => None,
    }
}

fn parse_index(segment: &str, len: usize) -> Option<usize> {
    segment.parse::<usize>().ok().filter(|&i| i < len)
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

macro_rules! scalar_nodes {
    ($($ty:ty => $variant:ident as $as:ty),* $(,)?) => {
        $(
            impl Node for $ty {
                fn view(&self) -> View<'_> {
                    View::Scalar(Scalar::$variant(*self as $as))
                }

                fn view_mut(&mut self) -> ViewMut<'_> {
                    ViewMut::Scalar(self)
                }
            }
        )*
    };
}

scalar_nodes! {
    bool => Bool as bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    isize => Int as i64,
    u8 => Uint as u64,
    u16 => Uint as u64,
    u32 => Uint as u64,
    u64 => Uint as u64,
    usize => Uint as u64,
    f32 => Float as f64,
    f64 => Float as f64,
    char => Char as char,
}

impl Node for String {
    fn view(&self) -> View<'_> {
        View::Scalar(Scalar::Str(self))
    }

    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Scalar(self)
    }
}

impl Node for () {
    fn view(&self) -> View<'_> {
        View::Unsupported
    }

    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Unsupported
    }
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

impl<T: Node + DeserializeOwned> Sequence for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<&dyn Node> {
        self.as_slice().get(index).map(|v| v as &dyn Node)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Node> {
        self.as_mut_slice().get_mut(index).map(|v| v as &mut dyn Node)
    }

    fn replace(&mut self, doc: Value) -> Result<(), DecodeError> {
        *self = serde_json::from_value(doc)?;
        Ok(())
    }

    fn append(&mut self, doc: Value) -> Result<usize, DecodeError> {
        let item: T = serde_json::from_value(doc)?;
        self.push(item);
        Ok(self.as_slice().len() - 1)
    }
}

impl<T: Node + DeserializeOwned> Node for Vec<T> {
    fn view(&self) -> View<'_> {
        View::Sequence(self)
    }

    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Sequence(self)
    }
}

// ---------------------------------------------------------------------------
// Keyed maps
// ---------------------------------------------------------------------------

macro_rules! keyed_map_common {
    ($map:ident, $key:ty) => {
        fn len(&self) -> usize {
            $map::len(self)
        }

        fn replace(&mut self, doc: Value) -> Result<(), DecodeError> {
            *self = serde_json::from_value(doc)?;
            Ok(())
        }

        fn insert(&mut self, doc: Value) -> Result<(), DecodeError> {
            if !doc.is_object() {
                return Err(DecodeError::NotAnObject);
            }
            let entries: $map<$key, V> = serde_json::from_value(doc)?;
            self.extend(entries);
            Ok(())
        }
    };
}

macro_rules! string_keyed_maps {
    ($($map:ident),*) => {
        $(
            impl<V: Node + DeserializeOwned> KeyedMap for $map<String, V> {
                keyed_map_common!($map, String);

                fn string_keyed(&self) -> bool {
                    true
                }

                fn entries(&self) -> Box<dyn Iterator<Item = (Cow<'_, str>, &dyn Node)> + '_> {
                    Box::new(
                        self.iter()
                            .map(|(k, v)| (Cow::Borrowed(k.as_str()), v as &dyn Node)),
                    )
                }

                fn get(&self, key: &str) -> Option<&dyn Node> {
                    $map::get(self, key).map(|v| v as &dyn Node)
                }

                fn get_mut(&mut self, key: &str) -> Option<&mut dyn Node> {
                    $map::get_mut(self, key).map(|v| v as &mut dyn Node)
                }
            }

            impl<V: Node + DeserializeOwned> Node for $map<String, V> {
                fn view(&self) -> View<'_> {
                    View::Map(self)
                }

                fn view_mut(&mut self) -> ViewMut<'_> {
                    ViewMut::Map(self)
                }
            }
        )*
    };
}

// Encodable, but not addressable by path.
macro_rules! integer_keyed_maps {
    ($map:ident: $($key:ty),*) => {
        $(
            impl<V: Node + DeserializeOwned> KeyedMap for $map<$key, V> {
                keyed_map_common!($map, $key);

                fn string_keyed(&self) -> bool {
                    false
                }

                fn entries(&self) -> Box<dyn Iterator<Item = (Cow<'_, str>, &dyn Node)> + '_> {
                    Box::new(
                        self.iter()
                            .map(|(k, v)| (Cow::Owned(k.to_string()), v as &dyn Node)),
                    )
                }

                fn get(&self, _key: &str) -> Option<&dyn Node> {
                    None
                }

                fn get_mut(&mut self, _key: &str) -> Option<&mut dyn Node> {
                    None
                }
            }

            impl<V: Node + DeserializeOwned> Node for $map<$key, V> {
                fn view(&self) -> View<'_> {
                    View::Map(self)
                }

                fn view_mut(&mut self) -> ViewMut<'_> {
                    ViewMut::Map(self)
                }
            }
        )*
    };
}

string_keyed_maps!(HashMap, BTreeMap);
integer_keyed_maps!(HashMap: i32, i64, u32, u64);
integer_keyed_maps!(BTreeMap: i32, i64, u32, u64);

// ---------------------------------------------------------------------------
// Indirections
// ---------------------------------------------------------------------------

impl<T: Node> Node for Box<T> {
    fn view(&self) -> View<'_> {
        View::Indirect(Some(&**self as &dyn Node))
    }

    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Indirect(Some(&mut **self as &mut dyn Node))
    }
}

impl Node for Box<dyn Node> {
    fn view(&self) -> View<'_> {
        View::Indirect(Some(&**self as &dyn Node))
    }

    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Indirect(Some(&mut **self as &mut dyn Node))
    }
}

// A shared `Arc` is writable only while it is uniquely owned.
impl<T: Node> Node for Arc<T> {
    fn view(&self) -> View<'_> {
        View::Indirect(Some(&**self as &dyn Node))
    }

    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Indirect(Arc::get_mut(self).map(|v| v as &mut dyn Node))
    }
}

impl Node for Arc<dyn Node> {
    fn view(&self) -> View<'_> {
        View::Indirect(Some(&**self as &dyn Node))
    }

    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Indirect(Arc::get_mut(self).map(|v| v as &mut dyn Node))
    }
}

impl<T: Node + DeserializeOwned> Node for Option<T> {
    fn view(&self) -> View<'_> {
        View::Indirect(self.as_ref().map(|v| v as &dyn Node))
    }

    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::Indirect(self.as_mut().map(|v| v as &mut dyn Node))
    }

    fn replace(&mut self, doc: Value) -> Result<(), DecodeError> {
        *self = serde_json::from_value(doc)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Implement [`Record`] and [`Node`] for a struct by listing its exposed fields.
///
/// Each field may be given an exposed name with `as`; otherwise the Rust field
/// name is used. Path lookup matches exposed names case-insensitively, and
/// encoders use them as keys.
///
/// ```rust
/// use std::collections::HashMap;
///
/// struct Sample {
///     string: String,
///     numbers: Vec<i64>,
///     map: HashMap<String, bool>,
/// }
///
/// restmap::record!(Sample {
///     string as "String",
///     numbers as "Numbers",
///     map as "Map",
/// });
/// ```
#[macro_export]
macro_rules! record {
    ($ty:ty { $($field:ident $(as $name:literal)?),* $(,)? }) => {
        impl $crate::Record for $ty {
            fn fields(&self) -> &'static [&'static str] {
                &[$($crate::__record_field_name!($field $(, $name)?)),*]
            }

            fn field(&self, name: &str) -> ::std::option::Option<&dyn $crate::Node> {
                $(
                    if name == $crate::__record_field_name!($field $(, $name)?) {
                        return ::std::option::Option::Some(&self.$field as &dyn $crate::Node);
                    }
                )*
                ::std::option::Option::None
            }

            fn field_mut(&mut self, name: &str) -> ::std::option::Option<&mut dyn $crate::Node> {
                $(
                    if name == $crate::__record_field_name!($field $(, $name)?) {
                        return ::std::option::Option::Some(
                            &mut self.$field as &mut dyn $crate::Node,
                        );
                    }
                )*
                ::std::option::Option::None
            }
        }

        impl $crate::Node for $ty {
            fn view(&self) -> $crate::View<'_> {
                $crate::View::Record(self)
            }

            fn view_mut(&mut self) -> $crate::ViewMut<'_> {
                $crate::ViewMut::Record(self)
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_field_name {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident, $name:literal) => {
        $name
    };
}

// --- tests -------------------------------------------------------------------
