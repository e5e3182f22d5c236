//! Round-trip validation of inferred schemas.

use super::registry::TypeRegistry;
use crate::codec;
use crate::error::Result;
use crate::sample::Sample;
use tracing::debug;

/// Checks that a registered type reproduces a sample exactly.
///
/// The sample is encoded through the type, decoded back and rendered with the
/// fixed conversion policy of [`codec::to_sample`]: 64-bit integers as plain
/// integers, enums by name, bytes as base64 strings. The rendering must equal
/// the original sample structurally. An encode the codec refuses counts as a
/// mismatch, not as an error.
pub struct RoundTripValidator<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> RoundTripValidator<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Returns `Ok(false)` on a mismatch; lookup and schema errors propagate.
    pub fn validate(&self, name: &str, sample: &Sample) -> Result<bool> {
        self.registry.lookup_type(name)?;
        let pool = self.registry.resolve()?;
        let descriptor = self.registry.message_descriptor(&pool, name)?;

        let bytes = match codec::encode(&descriptor, sample) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(type_name = name, error = %err, "sample rejected by codec");
                return Ok(false);
            }
        };
        let message = match codec::decode(&descriptor, bytes.as_slice()) {
            Ok(message) => message,
            Err(err) => {
                debug!(type_name = name, error = %err, "encoded sample failed to decode");
                return Ok(false);
            }
        };

        let rendered = codec::to_sample(&message);
        let matches = rendered == sample.normalized();
        if !matches {
            debug!(
                type_name = name,
                expected = %sample.to_json(),
                actual = %rendered.to_json(),
                "round-trip mismatch"
            );
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::infer::derive;
    use serde_json::json;

    fn registry_for(name: &str, sample: &Sample) -> TypeRegistry {
        let mut registry = TypeRegistry::new("Example");
        for definition in derive(name, sample).unwrap().insertions() {
            registry.insert(definition);
        }
        registry
    }

    #[test]
    fn test_round_trip_nested() {
        let sample = Sample::from(json!({
            "id": 7,
            "ok": false,
            "name": "",
            "tags": ["a", "b"],
            "user": {"id": 1, "score": 2.5}
        }));
        let registry = registry_for("Req", &sample);
        assert!(RoundTripValidator::new(&registry).validate("Req", &sample).unwrap());
    }

    #[test]
    fn test_round_trip_enum_and_bytes() {
        let sample = Sample::object([
            ("color", Sample::symbol("Color", "GREEN")),
            ("blob", Sample::Bytes(vec![0, 159, 146, 150])),
        ]);
        let registry = registry_for("Paint", &sample);
        assert!(RoundTripValidator::new(&registry).validate("Paint", &sample).unwrap());
    }

    #[test]
    fn test_float_precision_loss_fails() {
        // protobuf `float` is 32-bit
        let sample = Sample::from(json!({"ratio": 0.1}));
        let registry = registry_for("Req", &sample);
        assert!(!RoundTripValidator::new(&registry).validate("Req", &sample).unwrap());

        let exact = Sample::from(json!({"ratio": 0.5}));
        let registry = registry_for("Req", &exact);
        assert!(RoundTripValidator::new(&registry).validate("Req", &exact).unwrap());
    }

    #[test]
    fn test_out_of_range_integer_fails() {
        let sample = Sample::from(json!({"big": u64::MAX}));
        let registry = registry_for("Req", &sample);
        assert!(!RoundTripValidator::new(&registry).validate("Req", &sample).unwrap());
    }

    #[test]
    fn test_shape_mismatch_against_existing_type() {
        let registry = registry_for("Req", &Sample::from(json!({"id": 1})));
        let other = Sample::from(json!({"id": "not a number"}));
        assert!(!RoundTripValidator::new(&registry).validate("Req", &other).unwrap());
    }

    #[test]
    fn test_unknown_type_is_lookup_error() {
        let registry = TypeRegistry::new("Example");
        let err = RoundTripValidator::new(&registry)
            .validate("Nope", &Sample::from(json!({})))
            .unwrap_err();
        assert!(matches!(err, Error::Lookup(_)));
    }
}
