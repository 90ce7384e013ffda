use crate::model::simple::SimpleNode;
use crate::model::{DataRef, DbNode};
use crate::types::{AtomType, FuncType, NodeType, Type};
use crate::xdm::{ArrayItem, AtomicValue, Item, MapItem, Value};
use rust_decimal::Decimal;

/// Stand-in item of type `ty` for static analysis.
///
/// Preference order: the first item of `known` if its type is exactly `ty`;
/// an element placeholder in `data`; a canonical empty or zero item for
/// common types. Returns `None` when no representative can be built.
pub fn placeholder(ty: Type, known: Option<&Value>, data: Option<DataRef>) -> Option<Item> {
    if let Some(first) = known.and_then(Value::first)
        && first.ty() == ty
    {
        return Some(first);
    }
    if let Some(data) = data {
        return Some(Item::Node(DbNode::placeholder(data)));
    }
    Some(match ty {
        Type::Atomic(AtomType::String) => Item::string(""),
        Type::Atomic(AtomType::Integer) => Item::integer(0),
        Type::Atomic(AtomType::Double) => Item::double(0.0),
        Type::Atomic(AtomType::Float) => Item::Atomic(AtomicValue::Float(0.0)),
        Type::Atomic(AtomType::Decimal) => Item::Atomic(AtomicValue::Decimal(Decimal::ZERO)),
        Type::Atomic(AtomType::Boolean) => Item::from_bool(false),
        Type::Node(NodeType::Document | NodeType::DocumentElement) => {
            Item::Node(SimpleNode::dummy_document())
        }
        Type::Function(FuncType::Map) => Item::Map(MapItem::empty()),
        Type::Function(FuncType::Array) => Item::Array(ArrayItem::empty()),
        Type::Node(_) => Item::Node(SimpleNode::dummy_element()),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemorySource, NodeKind};

    #[test]
    fn prefers_known_first_item() {
        let v = Value::from_items(vec![Item::integer(7), Item::integer(8)]);
        assert_eq!(placeholder(Type::INTEGER, Some(&v), None), Some(Item::integer(7)));
    }

    #[test]
    fn mismatched_known_value_falls_back() {
        let v = Value::integer(7);
        assert_eq!(placeholder(Type::STRING, Some(&v), None), Some(Item::string("")));
    }

    #[test]
    fn data_source_yields_db_placeholder() {
        let data = MemorySource::new("db", []);
        let item = placeholder(Type::ITEM, None, Some(data.clone())).unwrap();
        let node = item.as_node().unwrap();
        assert_eq!(node.kind(), NodeKind::Element);
        assert!(node.data().is_some());
    }

    #[test]
    fn unknown_types_have_no_placeholder() {
        assert!(placeholder(Type::ITEM, None, None).is_none());
        assert!(placeholder(Type::FUNCTION, None, None).is_none());
        assert!(matches!(placeholder(Type::MAP, None, None), Some(Item::Map(_))));
    }
}
