//! Serde bridge for the node tree.
//!
//! Object nodes are carried as maps with the reserved keys `$id`, `$type`
//! and `$ref` ahead of the ordinary member entries; Array nodes are bare
//! sequences; primitive leaves are the matching scalar, with null carried as
//! a unit.
//!
//! The bridge lets any serde format crate encode the tree while the engine
//! itself stays format-agnostic. Positive integers are canonicalized to
//! [`Scalar::I64`] where they fit, so a tree survives a wire round-trip
//! structurally unchanged.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use serde_core::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_core::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::{Node, ObjectId, ObjectNode, Scalar};

/// The reserved key carrying an Object node's identity.
pub const ID_KEY: &str = "$id";
/// The reserved key carrying an Object node's runtime type tag.
pub const TYPE_KEY: &str = "$type";
/// The reserved key marking an Object node as a reference.
pub const REF_KEY: &str = "$ref";

// -----------------------------------------------------------------------------
// Serialize

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Primitive(scalar) => scalar.serialize(serializer),
            Self::Object(object) => {
                let reserved = usize::from(object.id.is_some())
                    + usize::from(object.type_tag.is_some())
                    + usize::from(object.reference.is_some());
                let mut map = serializer.serialize_map(Some(reserved + object.entries.len()))?;
                if let Some(ObjectId(id)) = object.id {
                    map.serialize_entry(ID_KEY, &id)?;
                }
                if let Some(tag) = &object.type_tag {
                    map.serialize_entry(TYPE_KEY, tag.as_ref())?;
                }
                if let Some(ObjectId(id)) = object.reference {
                    map.serialize_entry(REF_KEY, &id)?;
                }
                for (key, value) in &object.entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::I64(value) => serializer.serialize_i64(*value),
            Self::U64(value) => serializer.serialize_u64(*value),
            Self::F64(value) => serializer.serialize_f64(*value),
            Self::Str(value) => serializer.serialize_str(value),
        }
    }
}

// -----------------------------------------------------------------------------
// Deserialize

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a primitive, a map, or a sequence")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::null())
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::null())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Node, E> {
        Ok(Node::Primitive(Scalar::Bool(value)))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Node, E> {
        Ok(Node::Primitive(Scalar::I64(value)))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Node, E> {
        let scalar = match i64::try_from(value) {
            Ok(signed) => Scalar::I64(signed),
            Err(_) => Scalar::U64(value),
        };
        Ok(Node::Primitive(scalar))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Node, E> {
        Ok(Node::Primitive(Scalar::F64(value)))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Node, E> {
        Ok(Node::Primitive(Scalar::Str(value.into())))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Node, E> {
        Ok(Node::Primitive(Scalar::Str(value)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element::<Node>()? {
            values.push(value);
        }
        Ok(Node::Array(values))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut object = ObjectNode::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                ID_KEY => object.id = Some(ObjectId(map.next_value::<u64>()?)),
                TYPE_KEY => object.type_tag = Some(map.next_value::<String>()?.into()),
                REF_KEY => object.reference = Some(ObjectId(map.next_value::<u64>()?)),
                _ => object.entries.push((key, map.next_value::<Node>()?)),
            }
        }
        Ok(Node::Object(object))
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Node, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    fn sample_tree() -> Node {
        let mut inner = ObjectNode {
            id: Some(ObjectId(1)),
            ..ObjectNode::default()
        };
        inner.insert("label", Node::Primitive(Scalar::Str("root".into())));
        inner.insert(
            "items",
            Node::Array(vec![
                Node::Primitive(Scalar::I64(3)),
                Node::Primitive(Scalar::F64(0.5)),
                Node::null(),
            ]),
        );
        inner.insert("again", Node::reference(ObjectId(1)));
        Node::Object(inner)
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let tree = sample_tree();
        let text = serde_json::to_string(&tree).unwrap();
        let back: Node = serde_json::from_str(&text).unwrap();
        assert_eq!(tree, back);
    }

    #[test]
    fn reserved_keys_appear_on_the_wire() {
        let text = serde_json::to_string(&sample_tree()).unwrap();
        assert!(text.contains("\"$id\":1"));
        assert!(text.contains("\"$ref\":1"));
    }

    #[test]
    fn ron_round_trip_preserves_structure() {
        let tree = sample_tree();
        let text = ron::to_string(&tree).unwrap();
        let back: Node = ron::from_str(&text).unwrap();
        assert_eq!(tree, back);
    }

    #[test]
    fn type_tags_round_trip() {
        let node = Node::Object(ObjectNode {
            type_tag: Some("demo::Probe".into()),
            ..ObjectNode::default()
        });
        let text = serde_json::to_string(&node).unwrap();
        assert!(text.contains("\"$type\":\"demo::Probe\""));
        let back: Node = serde_json::from_str(&text).unwrap();
        assert_eq!(node, back);
    }
}
