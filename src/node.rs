//! The `node` module implements the document node: a value linked to
//! exactly one schema descriptor.

use crate::ansi::{self, Token};
use crate::meta::Meta;
use crate::schema::SchemaRef;
use std::collections::HashMap;

/// The scalar payload of a primitive node.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
  Str(String),
  Number(f64),
  Bool(bool),
  Null,
  Binary(Vec<u8>),
}

impl Scalar {
  /// The canonical primitive type name this scalar infers to.
  pub fn type_name(&self) -> &'static str {
    match self {
      Scalar::Str(_) => "string",
      Scalar::Number(_) => "number",
      Scalar::Bool(_) => "bool",
      Scalar::Null => "null",
      Scalar::Binary(_) => "binary",
    }
  }

  fn debug_render(&self) -> String {
    match self {
      Scalar::Str(s) => format!("{:?}", s),
      Scalar::Number(n) => render_number(*n),
      Scalar::Bool(b) => b.to_string(),
      Scalar::Null => "null".to_string(),
      Scalar::Binary(b) => format!("<{} bytes>", b.len()),
    }
  }
}

pub(crate) fn render_number(n: f64) -> String {
  if n.fract() == 0.0 && n.abs() < 1e15 {
    format!("{}", n as i64)
  } else {
    format!("{}", n)
  }
}

#[derive(Debug)]
enum Payload {
  Primitive(Scalar),
  List(Vec<Node>),
  Record(HashMap<String, Node>),
}

/// A value linked to exactly one [`crate::schema::SchemaDescriptor`].
///
/// A node owns its scalar value and child nodes exclusively; it shares its
/// schema descriptor, since named types may be referenced from multiple
/// sites through the decoder's registry.
#[derive(Debug)]
pub struct Node {
  pub schema: SchemaRef,
  pub meta: Meta,
  payload: Payload,
}

impl Node {
  pub fn primitive(schema: SchemaRef, value: Scalar) -> Node {
    Node {
      schema,
      meta: Meta::new(),
      payload: Payload::Primitive(value),
    }
  }

  pub fn list(schema: SchemaRef, elements: Vec<Node>) -> Node {
    Node {
      schema,
      meta: Meta::new(),
      payload: Payload::List(elements),
    }
  }

  pub fn record(schema: SchemaRef, fields: HashMap<String, Node>) -> Node {
    Node {
      schema,
      meta: Meta::new(),
      payload: Payload::Record(fields),
    }
  }

  pub fn is_primitive(&self) -> bool {
    matches!(self.payload, Payload::Primitive(_))
  }

  pub fn is_list(&self) -> bool {
    matches!(self.payload, Payload::List(_))
  }

  pub fn is_record(&self) -> bool {
    matches!(self.payload, Payload::Record(_))
  }

  pub fn value(&self) -> Option<&Scalar> {
    match &self.payload {
      Payload::Primitive(s) => Some(s),
      _ => None,
    }
  }

  pub fn elements(&self) -> Option<&[Node]> {
    match &self.payload {
      Payload::List(v) => Some(v),
      _ => None,
    }
  }

  pub fn elements_mut(&mut self) -> Option<&mut Vec<Node>> {
    match &mut self.payload {
      Payload::List(v) => Some(v),
      _ => None,
    }
  }

  pub fn field(&self, name: &str) -> Option<&Node> {
    match &self.payload {
      Payload::Record(fields) => fields.get(name),
      _ => None,
    }
  }

  pub fn fields_map(&self) -> Option<&HashMap<String, Node>> {
    match &self.payload {
      Payload::Record(fields) => Some(fields),
      _ => None,
    }
  }

  pub fn fields_map_mut(&mut self) -> Option<&mut HashMap<String, Node>> {
    match &mut self.payload {
      Payload::Record(fields) => Some(fields),
      _ => None,
    }
  }

  /// Record fields in the order defined by this node's linked schema, not
  /// insertion order. A field present in the schema but missing from the
  /// node's payload yields `None` — callers (the encoder) render that as
  /// `null`.
  pub fn ordered_fields(&self) -> Vec<(String, Option<&Node>)> {
    let fields = match &self.payload {
      Payload::Record(fields) => fields,
      _ => return Vec::new(),
    };
    self
      .schema
      .borrow()
      .fields()
      .iter()
      .map(|f| {
        let name = f.borrow().name.clone().unwrap_or_default();
        let node = fields.get(&name);
        (name, node)
      })
      .collect()
  }

  /// Recursively converts this node into a plain in-memory value.
  pub fn to_plain(&self) -> PlainValue {
    match &self.payload {
      Payload::Primitive(s) => match s {
        Scalar::Str(v) => PlainValue::String(v.clone()),
        Scalar::Number(v) => PlainValue::Number(*v),
        Scalar::Bool(v) => PlainValue::Bool(*v),
        Scalar::Null => PlainValue::Null,
        Scalar::Binary(v) => PlainValue::Binary(v.clone()),
      },
      Payload::List(elements) => {
        PlainValue::List(elements.iter().map(Node::to_plain).collect())
      }
      Payload::Record(_) => {
        let mut out = Vec::new();
        for (name, node) in self.ordered_fields() {
          if let Some(node) = node {
            out.push((name, node.to_plain()));
          }
        }
        PlainValue::Record(out)
      }
    }
  }

  /// Converts this node into a `serde_json::Value`, the crate's JSON
  /// interchange type.
  pub fn to_json(&self) -> serde_json::Value {
    self.to_plain().into()
  }

  /// Renders this node as JSON text, optionally wrapping each token in the
  /// shared ANSI palette (see [`crate::ansi`]).
  pub fn to_json_string(&self, colorize: bool) -> String {
    let mut out = String::new();
    write_json(&self.to_json(), colorize, &mut out);
    out
  }

  /// A compact one-line debug string:
  /// `<Node(LIST[int]) len=3>`, `<Node(DICT:any) val=3>`,
  /// `<Node(RECORD:User) fields=[id,name]>`.
  pub fn debug_string(&self) -> String {
    let schema = self.schema.borrow();
    match &self.payload {
      Payload::List(elements) => {
        let elem_type = schema
          .element()
          .map(|e| e.borrow().type_name.clone())
          .unwrap_or_else(|| "any".to_string());
        format!("<Node(LIST[{}]) len={}>", elem_type, elements.len())
      }
      Payload::Record(_) => {
        let names: Vec<String> = schema
          .fields()
          .iter()
          .map(|f| f.borrow().name.clone().unwrap_or_default())
          .collect();
        format!("<Node(RECORD:{}) fields=[{}]>", schema.type_name, names.join(","))
      }
      Payload::Primitive(scalar) => {
        format!("<Node(DICT:{}) val={}>", schema.type_name, scalar.debug_render())
      }
    }
  }
}

impl std::fmt::Display for Node {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "{}", self.debug_string())
  }
}

/// A plain in-memory value: what you get by fully unwrapping a [`Node`] tree
/// and discarding schema/metadata.
#[derive(Clone, Debug, PartialEq)]
pub enum PlainValue {
  Null,
  Bool(bool),
  Number(f64),
  String(String),
  Binary(Vec<u8>),
  List(Vec<PlainValue>),
  Record(Vec<(String, PlainValue)>),
}

impl From<PlainValue> for serde_json::Value {
  fn from(value: PlainValue) -> Self {
    use serde_json::{Map, Value};
    match value {
      PlainValue::Null => Value::Null,
      PlainValue::Bool(b) => Value::Bool(b),
      PlainValue::Number(n) => Value::Number(number_from_f64(n)),
      PlainValue::String(s) => Value::String(s),
      PlainValue::Binary(b) => {
        Value::String(b.iter().map(|byte| format!("{:02x}", byte)).collect())
      }
      PlainValue::List(items) => Value::Array(items.into_iter().map(Into::into).collect()),
      PlainValue::Record(fields) => {
        let mut map = Map::new();
        for (k, v) in fields {
          map.insert(k, v.into());
        }
        Value::Object(map)
      }
    }
  }
}

/// AKD carries every number as `f64`; JSON distinguishes integer-kind from
/// float-kind numbers for equality purposes, so a whole-valued `f64` is
/// rendered as an integer here rather than always going through
/// `Number::from_f64`, which would make `42.0` compare unequal to a JSON `42`.
fn number_from_f64(n: f64) -> serde_json::Number {
  if n.fract() == 0.0 && n.is_finite() {
    if n >= 0.0 && n <= u64::MAX as f64 {
      return (n as u64).into();
    }
    if n >= i64::MIN as f64 && n <= i64::MAX as f64 {
      return (n as i64).into();
    }
  }
  serde_json::Number::from_f64(n).unwrap_or_else(|| 0.into())
}

fn write_json(value: &serde_json::Value, colorize: bool, out: &mut String) {
  use serde_json::Value;
  let wrap = |token: Token, text: String| -> String {
    if colorize {
      ansi::wrap(token, &text)
    } else {
      text
    }
  };
  match value {
    Value::Null => out.push_str(&wrap(Token::Keyword, "null".to_string())),
    Value::Bool(b) => out.push_str(&wrap(Token::Keyword, b.to_string())),
    Value::Number(n) => out.push_str(&wrap(Token::Number, n.to_string())),
    Value::String(s) => out.push_str(&wrap(Token::String, format!("{:?}", s))),
    Value::Array(items) => {
      out.push_str(&wrap(Token::Punctuation, "[".to_string()));
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push_str(&wrap(Token::Punctuation, ",".to_string()));
        }
        write_json(item, colorize, out);
      }
      out.push_str(&wrap(Token::Punctuation, "]".to_string()));
    }
    Value::Object(map) => {
      out.push_str(&wrap(Token::Punctuation, "{".to_string()));
      for (i, (k, v)) in map.iter().enumerate() {
        if i > 0 {
          out.push_str(&wrap(Token::Punctuation, ",".to_string()));
        }
        out.push_str(&wrap(Token::Schema, format!("{:?}", k)));
        out.push_str(&wrap(Token::Punctuation, ":".to_string()));
        write_json(v, colorize, out);
      }
      out.push_str(&wrap(Token::Punctuation, "}".to_string()));
    }
  }
}
