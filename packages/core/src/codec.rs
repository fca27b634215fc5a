//! Encoders and decoders keyed by media type.
//!
//! | Codec | Media type | Shapes |
//! |-------|------------|--------|
//! | [`JsonCodec`] | `application/json` | all |
//! | [`TextCodec`] | `text/plain;charset=utf-8;q=0.5` | scalars |
//!
//! Encoding walks a [`Node`] through its [`View`]; maps are written with keys
//! in sorted order so output is stable. Decoding produces an intermediate
//! [`Value`] that the target node then applies to itself.

use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::error::Error;
use crate::media::{MediaType, MediaTypeList};
use crate::node::{concrete, DecodeError, Node, Scalar, Shape, View};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{type_name} has no {media} representation")]
    Unrepresentable {
        type_name: &'static str,
        media: &'static str,
    },
}

/// One representation format.
pub trait Codec: Send + Sync {
    /// The offered media type, including its server-side quality.
    fn media_type(&self) -> &MediaType;

    /// Whether values of this shape can be encoded.
    fn represents(&self, _shape: Shape) -> bool {
        true
    }

    fn encode(&self, node: &dyn Node) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, body: &[u8]) -> Result<Value, DecodeError>;
}

/// Serializes a node through its view.
pub struct Encoded<'a>(pub &'a dyn Node);

impl Serialize for Encoded<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self.0.view() {
            View::Scalar(Scalar::Bool(b)) => s.serialize_bool(b),
            View::Scalar(Scalar::Int(i)) => s.serialize_i64(i),
            View::Scalar(Scalar::Uint(u)) => s.serialize_u64(u),
            View::Scalar(Scalar::Float(x)) => s.serialize_f64(x),
            View::Scalar(Scalar::Char(c)) => s.serialize_char(c),
            View::Scalar(Scalar::Str(v)) => s.serialize_str(v),
            View::Sequence(seq) => {
                let mut out = s.serialize_seq(Some(seq.len()))?;
                for item in (0..seq.len()).filter_map(|i| seq.get(i)) {
                    out.serialize_element(&Encoded(item))?;
                }
                out.end()
            }
            View::Map(map) => {
                let mut entries: Vec<_> = map.entries().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                let mut out = s.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(&*key, &Encoded(value))?;
                }
                out.end()
            }
            View::Record(record) => {
                let fields = record.fields();
                let mut out = s.serialize_map(Some(fields.len()))?;
                for name in fields {
                    if let Some(value) = record.field(name) {
                        out.serialize_entry(name, &Encoded(value))?;
                    }
                }
                out.end()
            }
            View::Indirect(Some(inner)) => Encoded(inner).serialize(s),
            View::Indirect(None) => s.serialize_none(),
            View::Unsupported => Err(S::Error::custom(format!(
                "{} cannot be encoded",
                self.0.type_name()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub struct JsonCodec {
    media: MediaType,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self {
            media: MediaType::new("application", "json"),
        }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for JsonCodec {
    fn media_type(&self) -> &MediaType {
        &self.media
    }

    fn encode(&self, node: &dyn Node) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(&Encoded(node))?)
    }

    fn decode(&self, body: &[u8]) -> Result<Value, DecodeError> {
        Ok(serde_json::from_slice(body)?)
    }
}

// ---------------------------------------------------------------------------
// Plain text
// ---------------------------------------------------------------------------

/// Scalars as bare text. Offered below JSON.
pub struct TextCodec {
    media: MediaType,
}

impl TextCodec {
    pub fn new() -> Self {
        Self {
            media: MediaType::new("text", "plain")
                .with_param("charset", "utf-8")
                .with_quality(0.5),
        }
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for TextCodec {
    fn media_type(&self) -> &MediaType {
        &self.media
    }

    fn represents(&self, shape: Shape) -> bool {
        shape == Shape::Scalar
    }

    fn encode(&self, node: &dyn Node) -> Result<Vec<u8>, CodecError> {
        match concrete(node).map(|n| n.view()) {
            Some(View::Scalar(scalar)) => Ok(scalar.to_string().into_bytes()),
            _ => Err(CodecError::Unrepresentable {
                type_name: node.type_name(),
                media: "text/plain",
            }),
        }
    }

    /// A body that reads as a JSON scalar (`42`, `true`, `"x"`) decodes to it;
    /// anything else is taken as a raw string.
    fn decode(&self, body: &[u8]) -> Result<Value, DecodeError> {
        let text = std::str::from_utf8(body)?;
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) if !value.is_object() && !value.is_array() => Ok(value),
            _ => Ok(Value::String(text.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec set
// ---------------------------------------------------------------------------

/// The codecs a registry negotiates over, in offer order.
pub struct Codecs {
    codecs: Vec<Box<dyn Codec>>,
}

impl Codecs {
    /// A set with no codecs at all.
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    pub fn with(mut self, codec: impl Codec + 'static) -> Self {
        self.codecs.push(Box::new(codec));
        self
    }

    /// Media types offered for values of `shape`.
    pub fn available(&self, shape: Shape) -> MediaTypeList {
        self.codecs
            .iter()
            .filter(|c| c.represents(shape))
            .map(|c| c.media_type().clone())
            .collect()
    }

    /// The codec whose type and subtype equal `media`'s.
    pub fn for_media_type(&self, media: &MediaType) -> Option<&dyn Codec> {
        self.codecs
            .iter()
            .find(|c| same_essence(c.media_type(), media))
            .map(|c| &**c)
    }

    /// The codec for a request body. A missing content type means JSON.
    pub fn for_content_type(&self, content_type: Option<&str>) -> Result<&dyn Codec, Error> {
        let raw = content_type.unwrap_or("application/json");
        let media: MediaType = raw
            .parse()
            .map_err(|_| Error::UnsupportedMediaType(raw.to_string()))?;
        self.for_media_type(&media)
            .ok_or_else(|| Error::UnsupportedMediaType(raw.to_string()))
    }
}

impl Default for Codecs {
    fn default() -> Self {
        Self::empty().with(JsonCodec::new()).with(TextCodec::new())
    }
}

fn same_essence(a: &MediaType, b: &MediaType) -> bool {
    a.ty.eq_ignore_ascii_case(&b.ty) && a.subtype.eq_ignore_ascii_case(&b.subtype)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::fixtures::{sample, SAMPLE_JSON};

    fn json(node: &dyn Node) -> String {
        String::from_utf8(JsonCodec::new().encode(node).unwrap()).unwrap()
    }

    #[test]
    fn json_encodes_records_in_field_order() {
        assert_eq!(json(&sample()), SAMPLE_JSON);
    }

    #[test]
    fn json_follows_indirections() {
        let boxed: Box<Option<Box<i64>>> = Box::new(Some(Box::new(7)));
        assert_eq!(json(&boxed), "7");
        let empty: Option<i64> = None;
        assert_eq!(json(&empty), "null");
    }

    #[test]
    fn integer_keys_render_as_strings() {
        let map = BTreeMap::from([(2u64, "b".to_string()), (1, "a".to_string())]);
        assert_eq!(json(&map), r#"{"1":"a","2":"b"}"#);
    }

    #[test]
    fn unsupported_values_fail_to_encode() {
        let units = vec![(), ()];
        assert!(JsonCodec::new().encode(&units).is_err());
    }

    #[test]
    fn text_encodes_scalars_only() {
        let text = TextCodec::new();
        assert_eq!(text.encode(&String::from("hi")).unwrap(), b"hi");
        assert_eq!(text.encode(&Box::new(1.5f64)).unwrap(), b"1.5");
        assert!(matches!(
            text.encode(&vec![1i64]),
            Err(CodecError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn text_decodes_literals_or_raw_strings() {
        let text = TextCodec::new();
        assert_eq!(text.decode(b"42").unwrap(), json!(42));
        assert_eq!(text.decode(b"true\n").unwrap(), json!(true));
        assert_eq!(text.decode(b"hello world").unwrap(), json!("hello world"));
        assert_eq!(text.decode(b"[1,2]").unwrap(), json!("[1,2]"));
        assert!(text.decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn available_depends_on_shape() {
        let codecs = Codecs::default();
        assert_eq!(
            codecs.available(Shape::Scalar).to_string(),
            "application/json, text/plain;charset=utf-8;q=0.5"
        );
        assert_eq!(codecs.available(Shape::Record).to_string(), "application/json");
    }

    #[test]
    fn content_type_lookup() {
        let codecs = Codecs::default();
        let json = codecs.for_content_type(None).unwrap();
        assert_eq!(json.media_type().essence(), "application/json");

        let text = codecs
            .for_content_type(Some("Text/Plain; charset=utf-8"))
            .unwrap();
        assert_eq!(text.media_type().subtype, "plain");

        assert!(matches!(
            codecs.for_content_type(Some("image/png")),
            Err(Error::UnsupportedMediaType(ct)) if ct == "image/png"
        ));
    }
}
