//! The `builder` module turns plain values (currently `serde_json::Value`,
//! the crate's JSON interchange type — see [`crate::node::Node::to_json`])
//! into a schema-linked [`Node`] tree without going through the text codec
//! at all. This is what backs the `parse` entry point and the plain-value
//! overload of `encode`.

use crate::node::{Node, Scalar};
use crate::schema::{SchemaDescriptor, SchemaRef};
use std::collections::{HashMap, HashSet};

/// Construction-time failure: the input isn't one of the shapes the node
/// builder accepts.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
  #[error("Unsupported structure type: {0}")]
  Unsupported(String),
}

/// Builds a [`Node`] tree from a plain JSON value.
///
/// - `null` -> primitive `null`
/// - `bool` -> primitive `bool`
/// - `number` -> primitive `number`
/// - `string` -> primitive `string`
/// - empty array -> list of `any`
/// - non-empty array -> each element built recursively; if every element is
///   a record, the list's element schema is the union of their fields (in
///   first-seen order, first descriptor wins for a given name), otherwise
///   it's the first element's schema
/// - object -> record, fields in the object's own iteration order
pub fn parse(value: &serde_json::Value) -> Result<Node, NodeError> {
  build(value)
}

fn build(value: &serde_json::Value) -> Result<Node, NodeError> {
  use serde_json::Value;
  match value {
    Value::Null => Ok(Node::primitive(SchemaDescriptor::primitive("null"), Scalar::Null)),
    Value::Bool(b) => Ok(Node::primitive(SchemaDescriptor::primitive("bool"), Scalar::Bool(*b))),
    Value::Number(n) => {
      let f = n
        .as_f64()
        .ok_or_else(|| NodeError::Unsupported(format!("non-finite number: {}", n)))?;
      Ok(Node::primitive(SchemaDescriptor::primitive("number"), Scalar::Number(f)))
    }
    Value::String(s) => {
      Ok(Node::primitive(SchemaDescriptor::primitive("string"), Scalar::Str(s.clone())))
    }
    Value::Array(items) => build_list(items),
    Value::Object(obj) => build_record(obj),
  }
}

fn build_list(items: &[serde_json::Value]) -> Result<Node, NodeError> {
  if items.is_empty() {
    let schema = SchemaDescriptor::list(SchemaDescriptor::any());
    return Ok(Node::list(schema, Vec::new()));
  }

  let built: Vec<Node> = items.iter().map(build).collect::<Result<_, _>>()?;
  let element_schema = if built.iter().all(Node::is_record) {
    unify_record_schemas(&built)
  } else {
    built[0].schema.clone()
  };

  let list_schema = SchemaDescriptor::list(element_schema);
  Ok(Node::list(list_schema, built))
}

fn unify_record_schemas(nodes: &[Node]) -> SchemaRef {
  let mut seen = HashSet::new();
  let mut ordered: Vec<SchemaRef> = Vec::new();
  for node in nodes {
    let schema = node.schema.borrow();
    for field in schema.fields() {
      let name = field.borrow().name.clone().unwrap_or_default();
      if seen.insert(name) {
        ordered.push(field.clone());
      }
    }
  }

  let unified = SchemaDescriptor::record();
  for field in ordered {
    unified.borrow_mut().add_field(field);
  }
  unified
}

fn build_record(obj: &serde_json::Map<String, serde_json::Value>) -> Result<Node, NodeError> {
  let schema = SchemaDescriptor::record();
  let mut fields = HashMap::new();
  for (key, value) in obj {
    let child = build(value)?;
    child.schema.borrow_mut().name = Some(key.clone());
    schema.borrow_mut().add_field(child.schema.clone());
    fields.insert(key.clone(), child);
  }
  Ok(Node::record(schema, fields))
}

#[cfg(test)]
mod test {
  use super::*;
  use serde_json::json;

  #[test]
  fn builds_primitives() {
    assert!(parse(&json!(null)).unwrap().is_primitive());
    assert_eq!(
      parse(&json!(42)).unwrap().value().unwrap().type_name(),
      "number"
    );
  }

  #[test]
  fn builds_record_preserving_key_order() {
    let node = parse(&json!({"b": 1, "a": 2})).unwrap();
    let order: Vec<String> = node.ordered_fields().into_iter().map(|(n, _)| n).collect();
    assert_eq!(order, vec!["b".to_string(), "a".to_string()]);
  }

  #[test]
  fn unifies_list_of_records_by_first_seen_field_order() {
    let node = parse(&json!([
      {"name": "A", "val": 1},
      {"val": 2, "name": "B", "extra": true}
    ]))
    .unwrap();
    let element = node.schema.borrow().element().unwrap();
    let names: Vec<String> = element
      .borrow()
      .fields()
      .iter()
      .map(|f| f.borrow().name.clone().unwrap())
      .collect();
    assert_eq!(names, vec!["name".to_string(), "val".to_string(), "extra".to_string()]);
  }

  #[test]
  fn empty_list_is_any() {
    let node = parse(&json!([])).unwrap();
    assert!(node.schema.borrow().element().unwrap().borrow().is_any());
  }
}
