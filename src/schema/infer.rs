//! Schema inference from sample values.
//!
//! Inference is split in two. [`derive`] is pure: it walks a sample and
//! returns an owned [`TypeNode`] tree, one node per definition the sample
//! needs. [`SchemaInferencer::infer`] then applies that tree to a
//! [`TypeRegistry`] and runs the round-trip check.
//!
//! Field mapping rules:
//!
//! - booleans, strings and bytes map to `bool`, `string` and `bytes`
//! - numbers map to `int64` when integral, `float` otherwise
//! - a symbol references an enum named after its type
//! - a nested object references a message named after the field key
//! - an array takes the kind of its elements; when elements disagree the
//!   last kind added to the de-duplicated set of observed kinds wins
//!
//! Insertion is first-writer-wins. Two different keys that need sub-messages
//! with the same derived name share whichever definition was inserted first;
//! the later shape is never merged in. The round-trip check is what reports
//! such collisions, as a schema mismatch.

use super::registry::TypeRegistry;
use super::validate::RoundTripValidator;
use super::{Definition, EnumDefinition, FieldDefinition, FieldKind, ScalarKind, TypeDefinition};
use crate::error::{Error, Result};
use crate::sample::{exact_i64, Sample};
use tracing::{debug, warn};

/// A derived definition together with the definitions it embeds.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    pub definition: Definition,
    pub children: Vec<TypeNode>,
}

impl TypeNode {
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Flattens the tree parent-first, children in field order.
    pub fn insertions(self) -> Vec<Definition> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(self, out: &mut Vec<Definition>) {
        out.push(self.definition);
        for child in self.children {
            child.collect_into(out);
        }
    }
}

/// Derives the definition tree for a sample registered under `name`.
///
/// The sample must be an object. Nothing is mutated.
pub fn derive(name: &str, sample: &Sample) -> Result<TypeNode> {
    let entries = sample.as_object().ok_or_else(|| {
        Error::unsupported(name, format!("expected an object, found {}", sample.kind_name()))
    })?;

    let mut definition = TypeDefinition::new(name);
    let mut children = Vec::new();

    for (position, (key, value)) in entries.iter().enumerate() {
        let (kind, repeated) = match value {
            Sample::Array(items) => {
                let mut observed: Vec<FieldKind> = Vec::new();
                for item in items {
                    let kind = element_kind(name, key, item, &mut children)?;
                    if !observed.contains(&kind) {
                        observed.push(kind);
                    }
                }
                let kind = observed.pop().ok_or_else(|| {
                    Error::unsupported(name, format!("field `{}` is an empty array", key))
                })?;
                if !observed.is_empty() {
                    debug!(type_name = name, field = %key, chosen = %kind, "mixed array collapsed");
                }
                (kind, true)
            }
            other => (element_kind(name, key, other, &mut children)?, false),
        };

        definition.fields.push(FieldDefinition {
            name: key.clone(),
            index: position as u32 + 1,
            kind,
            repeated,
        });
    }

    Ok(TypeNode {
        definition: Definition::Message(definition),
        children,
    })
}

fn element_kind(
    owner: &str,
    key: &str,
    value: &Sample,
    children: &mut Vec<TypeNode>,
) -> Result<FieldKind> {
    let kind = match value {
        Sample::Bool(_) => FieldKind::Scalar(ScalarKind::Bool),
        Sample::String(_) => FieldKind::Scalar(ScalarKind::String),
        Sample::Bytes(_) => FieldKind::Scalar(ScalarKind::Bytes),
        Sample::Int(_) => FieldKind::Scalar(ScalarKind::Int64),
        Sample::Float(f) => match exact_i64(*f) {
            Some(_) => FieldKind::Scalar(ScalarKind::Int64),
            None => FieldKind::Scalar(ScalarKind::Float),
        },
        Sample::Symbol(symbol) => {
            push_variant(children, &symbol.type_name, &symbol.variant);
            FieldKind::Reference(symbol.type_name.clone())
        }
        Sample::Object(_) => {
            children.push(derive(key, value)?);
            FieldKind::Reference(key.to_string())
        }
        Sample::Array(_) => {
            return Err(Error::unsupported(
                owner,
                format!("field `{}` contains a nested array", key),
            ))
        }
        Sample::Null => {
            return Err(Error::unsupported(owner, format!("field `{}` is null", key)))
        }
    };
    Ok(kind)
}

/// Records an enum variant, merging with an enum already derived at this level.
fn push_variant(children: &mut Vec<TypeNode>, type_name: &str, variant: &str) {
    for child in children.iter_mut() {
        if let Definition::Enum(enumeration) = &mut child.definition {
            if enumeration.name == type_name {
                if !enumeration.variants.iter().any(|v| v == variant) {
                    enumeration.variants.push(variant.to_string());
                }
                return;
            }
        }
    }
    children.push(TypeNode {
        definition: Definition::Enum(EnumDefinition {
            name: type_name.to_string(),
            variants: vec![variant.to_string()],
        }),
        children: Vec::new(),
    });
}

/// Applies derived definitions to a registry and validates the result.
pub struct SchemaInferencer<'a> {
    registry: &'a mut TypeRegistry,
}

impl<'a> SchemaInferencer<'a> {
    pub fn new(registry: &'a mut TypeRegistry) -> Self {
        Self { registry }
    }

    /// Infers and registers the types needed by `sample` under `name`.
    ///
    /// Returns the names that were newly inserted; names already present are
    /// left untouched. When the round-trip check fails the newly inserted
    /// definitions are withdrawn and [`Error::SchemaMismatch`] is returned.
    pub fn infer(&mut self, name: &str, sample: &Sample) -> Result<Vec<String>> {
        let tree = derive(name, sample)?;

        let mut inserted = Vec::new();
        for definition in tree.insertions() {
            let def_name = definition.name().to_string();
            if self.registry.insert(definition) {
                inserted.push(def_name);
            } else if def_name != name {
                warn!(type_name = name, existing = %def_name, "reusing previously registered definition");
            }
        }
        debug!(type_name = name, inserted = ?inserted, "definitions registered");

        let valid = RoundTripValidator::new(self.registry).validate(name, sample);
        match valid {
            Ok(true) => Ok(inserted),
            Ok(false) => {
                self.registry.withdraw(&inserted);
                Err(Error::SchemaMismatch {
                    type_name: name.to_string(),
                })
            }
            Err(err) => {
                self.registry.withdraw(&inserted);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(node: &TypeNode) -> &TypeDefinition {
        node.definition.as_message().unwrap()
    }

    #[test]
    fn test_field_indices_follow_key_order() {
        let sample = Sample::from(json!({"b": true, "a": "x", "c": 3}));
        let node = derive("Req", &sample).unwrap();
        let def = message(&node);
        let fields: Vec<(&str, u32)> = def.fields.iter().map(|f| (f.name.as_str(), f.index)).collect();
        assert_eq!(fields, vec![("b", 1), ("a", 2), ("c", 3)]);

        let again = derive("Req", &sample).unwrap();
        assert_eq!(node, again);
    }

    #[test]
    fn test_scalar_mapping() {
        let sample = Sample::object([
            ("flag", Sample::Bool(true)),
            ("label", Sample::from("x")),
            ("count", Sample::Int(4)),
            ("whole", Sample::Float(4.0)),
            ("ratio", Sample::Float(0.5)),
            ("blob", Sample::Bytes(vec![1, 2])),
        ]);
        let node = derive("Scalars", &sample).unwrap();
        let def = message(&node);
        let kind = |n: &str| def.field(n).unwrap().kind.clone();
        assert_eq!(kind("flag"), FieldKind::Scalar(ScalarKind::Bool));
        assert_eq!(kind("label"), FieldKind::Scalar(ScalarKind::String));
        assert_eq!(kind("count"), FieldKind::Scalar(ScalarKind::Int64));
        assert_eq!(kind("whole"), FieldKind::Scalar(ScalarKind::Int64));
        assert_eq!(kind("ratio"), FieldKind::Scalar(ScalarKind::Float));
        assert_eq!(kind("blob"), FieldKind::Scalar(ScalarKind::Bytes));
    }

    #[test]
    fn test_mixed_array_last_seen_wins() {
        let sample = Sample::from(json!({"ids": [1.5, "x", 2]}));
        let node = derive("Req", &sample).unwrap();
        let field = message(&node).field("ids").unwrap().clone();
        assert!(field.repeated);
        assert_eq!(field.kind, FieldKind::Scalar(ScalarKind::Int64));
    }

    #[test]
    fn test_mixed_array_uses_unique_kinds() {
        // int64 is seen again last, but it was already in the set
        let sample = Sample::from(json!({"ids": [2, "x", 3]}));
        let node = derive("Req", &sample).unwrap();
        let field = message(&node).field("ids").unwrap();
        assert_eq!(field.kind, FieldKind::Scalar(ScalarKind::String));
    }

    #[test]
    fn test_nested_object_references_key() {
        let sample = Sample::from(json!({"user": {"id": 1}}));
        let node = derive("Outer", &sample).unwrap();
        let user_field = message(&node).field("user").unwrap();
        assert_eq!(user_field.kind, FieldKind::Reference("user".into()));
        assert!(!user_field.repeated);

        assert_eq!(node.children.len(), 1);
        let user = message(&node.children[0]);
        assert_eq!(user.name, "user");
        assert_eq!(user.fields.len(), 1);
        assert_eq!(user.fields[0].kind, FieldKind::Scalar(ScalarKind::Int64));
    }

    #[test]
    fn test_empty_object_has_no_fields() {
        let node = derive("Empty", &Sample::from(json!({}))).unwrap();
        assert!(message(&node).fields.is_empty());
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_symbols_collect_variants() {
        let sample = Sample::object([(
            "colors",
            Sample::Array(vec![
                Sample::symbol("Color", "RED"),
                Sample::symbol("Color", "BLUE"),
                Sample::symbol("Color", "RED"),
            ]),
        )]);
        let node = derive("Palette", &sample).unwrap();
        assert_eq!(
            message(&node).field("colors").unwrap().kind,
            FieldKind::Reference("Color".into())
        );
        assert_eq!(
            node.children[0].definition,
            Definition::Enum(EnumDefinition {
                name: "Color".into(),
                variants: vec!["RED".into(), "BLUE".into()],
            })
        );
    }

    #[test]
    fn test_insertions_are_parent_first() {
        let sample = Sample::from(json!({"a": {"x": {"y": 1}}, "b": {"z": 2}}));
        let names: Vec<String> = derive("Root", &sample)
            .unwrap()
            .insertions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["Root", "a", "x", "b"]);
    }

    #[test]
    fn test_unsupported_shapes() {
        for sample in [
            json!({"gone": null}),
            json!({"empty": []}),
            json!({"grid": [[1, 2], [3]]}),
            json!([1, 2]),
        ] {
            let err = derive("Bad", &Sample::from(sample)).unwrap_err();
            assert!(matches!(err, Error::UnsupportedSample { .. }));
        }
    }

    #[test]
    fn test_infer_is_idempotent() {
        let mut registry = TypeRegistry::new("Example");
        let sample = Sample::from(json!({"id": 1, "name": "x"}));

        let first = SchemaInferencer::new(&mut registry).infer("Req", &sample).unwrap();
        assert_eq!(first, vec!["Req".to_string()]);

        let second = SchemaInferencer::new(&mut registry).infer("Req", &sample).unwrap();
        assert!(second.is_empty());
        assert_eq!(registry.definitions().filter(|d| d.name() == "Req").count(), 1);
    }

    #[test]
    fn test_failed_inference_is_withdrawn() {
        let mut registry = TypeRegistry::new("Example");
        let sample = Sample::from(json!({"ids": [1.5, "x", 2]}));

        let err = SchemaInferencer::new(&mut registry).infer("Req", &sample).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { ref type_name } if type_name == "Req"));
        assert!(registry.lookup("Req").is_none());
    }
}
