//! Conversion between samples and protobuf messages.
//!
//! [`to_message`] checks a sample against a message descriptor while building
//! a `DynamicMessage`; [`to_sample`] renders a decoded message back into a
//! sample. [`SampleCodec`] plugs both into tonic so requests and responses
//! travel as [`Sample`]s on either side of the wire.

use crate::error::{Error, Result};
use crate::sample::{exact_i64, Sample, Symbol};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Buf, Bytes};
use prost::Message;
use prost_reflect::{DynamicMessage, Kind, MapKey, MessageDescriptor, ReflectMessage, Value};
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

/// Builds a message from a sample, verifying every field against the descriptor.
pub fn to_message(descriptor: &MessageDescriptor, sample: &Sample) -> Result<DynamicMessage> {
    let entries = sample.as_object().ok_or_else(|| {
        Error::Codec(format!(
            "{}: expected an object, found {}",
            descriptor.full_name(),
            sample.kind_name()
        ))
    })?;

    let mut message = DynamicMessage::new(descriptor.clone());
    for (key, value) in entries {
        let field = descriptor.get_field_by_name(key).ok_or_else(|| {
            Error::Codec(format!("{} has no field `{}`", descriptor.full_name(), key))
        })?;
        let path = format!("{}.{}", descriptor.name(), key);
        let kind = field.kind();

        let value = if field.is_list() {
            let items = match value {
                Sample::Array(items) => items,
                other => return Err(mismatch(&path, "array", other)),
            };
            Value::List(
                items
                    .iter()
                    .map(|item| to_value(&kind, item, &path))
                    .collect::<Result<Vec<_>>>()?,
            )
        } else {
            to_value(&kind, value, &path)?
        };

        message
            .try_set_field(&field, value)
            .map_err(|e| Error::Codec(format!("{}: {}", path, e)))?;
    }
    Ok(message)
}

fn mismatch(path: &str, expected: &str, found: &Sample) -> Error {
    Error::Codec(format!(
        "{}: expected {}, found {}",
        path,
        expected,
        found.kind_name()
    ))
}

fn to_value(kind: &Kind, sample: &Sample, path: &str) -> Result<Value> {
    let value = match (kind, sample) {
        (Kind::Bool, Sample::Bool(b)) => Value::Bool(*b),
        (Kind::String, Sample::String(s)) => Value::String(s.clone()),
        (Kind::Int64, Sample::Int(i)) => Value::I64(*i),
        (Kind::Int64, Sample::Float(f)) => match exact_i64(*f) {
            Some(i) => Value::I64(i),
            None => return Err(Error::Codec(format!("{}: {} is not a 64-bit integer", path, f))),
        },
        (Kind::Float, Sample::Float(f)) => Value::F32(*f as f32),
        (Kind::Float, Sample::Int(i)) => Value::F32(*i as f32),
        (Kind::Bytes, Sample::Bytes(b)) => Value::Bytes(Bytes::copy_from_slice(b)),
        (Kind::Bytes, Sample::String(s)) => match STANDARD.decode(s) {
            Ok(b) => Value::Bytes(Bytes::from(b)),
            Err(e) => return Err(Error::Codec(format!("{}: invalid base64: {}", path, e))),
        },
        (Kind::Enum(enumeration), Sample::Symbol(Symbol { variant, .. }))
        | (Kind::Enum(enumeration), Sample::String(variant)) => {
            match enumeration.get_value_by_name(variant) {
                Some(value) => Value::EnumNumber(value.number()),
                None => {
                    return Err(Error::Codec(format!(
                        "{}: `{}` is not a variant of {}",
                        path,
                        variant,
                        enumeration.name()
                    )))
                }
            }
        }
        (Kind::Message(descriptor), Sample::Object(_)) => {
            Value::Message(to_message(descriptor, sample)?)
        }
        (Kind::Bool, other) => return Err(mismatch(path, "boolean", other)),
        (Kind::String, other) => return Err(mismatch(path, "string", other)),
        (Kind::Int64 | Kind::Float, other) => return Err(mismatch(path, "number", other)),
        (Kind::Bytes, other) => return Err(mismatch(path, "bytes", other)),
        (Kind::Enum(_), other) => return Err(mismatch(path, "symbol", other)),
        (Kind::Message(_), other) => return Err(mismatch(path, "object", other)),
        (other, _) => {
            return Err(Error::Codec(format!("{}: unsupported field kind {:?}", path, other)))
        }
    };
    Ok(value)
}

/// Renders a message as a sample.
///
/// Only fields present on the wire are rendered, so an empty repeated field
/// is omitted. 64-bit integers stay integers, enums render as symbols and
/// bytes as base64 strings.
pub fn to_sample(message: &DynamicMessage) -> Sample {
    let mut entries = Vec::new();
    for field in message.descriptor().fields() {
        if !message.has_field(&field) {
            continue;
        }
        let value = message.get_field(&field);
        entries.push((field.name().to_string(), value_to_sample(&field.kind(), &value)));
    }
    Sample::Object(entries)
}

fn value_to_sample(kind: &Kind, value: &Value) -> Sample {
    match value {
        Value::Bool(b) => Sample::Bool(*b),
        Value::I32(i) => Sample::Int(i64::from(*i)),
        Value::I64(i) => Sample::Int(*i),
        Value::U32(u) => Sample::Int(i64::from(*u)),
        Value::U64(u) => match i64::try_from(*u) {
            Ok(i) => Sample::Int(i),
            Err(_) => Sample::Float(*u as f64),
        },
        Value::F32(f) => Sample::Float(f64::from(*f)),
        Value::F64(f) => Sample::Float(*f),
        Value::String(s) => Sample::String(s.clone()),
        Value::Bytes(b) => Sample::String(STANDARD.encode(b)),
        Value::EnumNumber(number) => match kind {
            Kind::Enum(enumeration) => match enumeration.get_value(*number) {
                Some(variant) => Sample::symbol(enumeration.name(), variant.name()),
                None => Sample::Int(i64::from(*number)),
            },
            _ => Sample::Int(i64::from(*number)),
        },
        Value::Message(message) => to_sample(message),
        Value::List(items) => {
            Sample::Array(items.iter().map(|item| value_to_sample(kind, item)).collect())
        }
        Value::Map(map) => Sample::Object(
            map.iter()
                .map(|(key, value)| (map_key(key), value_to_sample(kind, value)))
                .collect(),
        ),
    }
}

fn map_key(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::I32(i) => i.to_string(),
        MapKey::I64(i) => i.to_string(),
        MapKey::U32(u) => u.to_string(),
        MapKey::U64(u) => u.to_string(),
        MapKey::String(s) => s.clone(),
    }
}

/// Encodes a sample to protobuf bytes.
pub fn encode(descriptor: &MessageDescriptor, sample: &Sample) -> Result<Vec<u8>> {
    Ok(to_message(descriptor, sample)?.encode_to_vec())
}

/// Decodes protobuf bytes into a message of the given type.
pub fn decode<B: Buf>(descriptor: &MessageDescriptor, bytes: B) -> Result<DynamicMessage> {
    DynamicMessage::decode(descriptor.clone(), bytes)
        .map_err(|e| Error::Codec(format!("{}: {}", descriptor.full_name(), e)))
}

/// A tonic codec carrying [`Sample`]s.
///
/// `encode` is the message type written to the wire and `decode` the one
/// read from it: a server encodes responses and decodes requests, a client
/// does the opposite.
#[derive(Debug, Clone)]
pub struct SampleCodec {
    encode: MessageDescriptor,
    decode: MessageDescriptor,
}

impl SampleCodec {
    pub fn new(encode: MessageDescriptor, decode: MessageDescriptor) -> Self {
        Self { encode, decode }
    }
}

impl Codec for SampleCodec {
    type Encode = Sample;
    type Decode = Sample;
    type Encoder = SampleEncoder;
    type Decoder = SampleDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        SampleEncoder(self.encode.clone())
    }

    fn decoder(&mut self) -> Self::Decoder {
        SampleDecoder(self.decode.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SampleEncoder(MessageDescriptor);

impl Encoder for SampleEncoder {
    type Item = Sample;
    type Error = Status;

    fn encode(
        &mut self,
        item: Self::Item,
        dst: &mut EncodeBuf<'_>,
    ) -> std::result::Result<(), Self::Error> {
        let message = to_message(&self.0, &item).map_err(Status::from)?;
        message
            .encode(dst)
            .map_err(|e| Status::internal(format!("Failed to encode {}: {}", self.0.full_name(), e)))
    }
}

#[derive(Debug, Clone)]
pub struct SampleDecoder(MessageDescriptor);

impl Decoder for SampleDecoder {
    type Item = Sample;
    type Error = Status;

    fn decode(
        &mut self,
        src: &mut DecodeBuf<'_>,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        let message = DynamicMessage::decode(self.0.clone(), src).map_err(|e| {
            Status::invalid_argument(format!("Failed to decode {}: {}", self.0.full_name(), e))
        })?;
        Ok(Some(to_sample(&message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{derive, TypeRegistry};
    use serde_json::json;

    fn descriptor(sample: &Sample) -> MessageDescriptor {
        let mut registry = TypeRegistry::new("Example");
        for definition in derive("Req", sample).unwrap().insertions() {
            registry.insert(definition);
        }
        let pool = registry.resolve().unwrap();
        registry.message_descriptor(&pool, "Req").unwrap()
    }

    #[test]
    fn test_encode_decode() {
        let sample = Sample::from(json!({"id": 1, "name": "x", "ok": true}));
        let descriptor = descriptor(&sample);
        let bytes = encode(&descriptor, &sample).unwrap();
        let message = decode(&descriptor, bytes.as_slice()).unwrap();
        assert_eq!(to_sample(&message), sample);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let descriptor = descriptor(&Sample::from(json!({"id": 1})));
        let err = to_message(&descriptor, &Sample::from(json!({"id": 1, "extra": 2}))).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let descriptor = descriptor(&Sample::from(json!({"id": 1})));
        assert!(to_message(&descriptor, &Sample::from(json!({"id": "one"}))).is_err());
        assert!(to_message(&descriptor, &Sample::from(json!({"id": 1.5}))).is_err());
        assert!(to_message(&descriptor, &Sample::from(json!({"id": 2.0}))).is_ok());
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let descriptor = descriptor(&Sample::from(json!({"id": 1, "tags": ["a"]})));
        let message = to_message(&descriptor, &Sample::from(json!({}))).unwrap();
        assert_eq!(to_sample(&message), Sample::from(json!({})));
    }

    #[test]
    fn test_bytes_accept_base64_strings() {
        let sample = Sample::object([("blob", Sample::Bytes(b"hi".to_vec()))]);
        let descriptor = descriptor(&sample);
        let from_string = Sample::object([("blob", Sample::from("aGk="))]);
        let message = to_message(&descriptor, &from_string).unwrap();
        assert_eq!(to_sample(&message), from_string);
    }
}
