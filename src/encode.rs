//! The `encode` module renders a schema-linked [`crate::node::Node`] tree
//! back to AKD text: a header (the root schema) followed by the data body.
//!
//! Rendering mirrors the decoder's grammar exactly, so `decode(encode(n))`
//! round-trips for any `n` produced by [`crate::decode::decode`] or
//! [`crate::builder::parse`] (metadata ordering and spacing aside).

use crate::ansi::{self, Token};
use crate::builder;
use crate::meta::{AttrValue, Meta};
use crate::node::{render_number, Node, Scalar};
use crate::schema::{SchemaDescriptor, SchemaRef};
use std::collections::HashSet;
use std::rc::Rc;

/// Rendering options for [`encode`] (all individually toggleable).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
  /// Break records and lists across lines, indented by `indent` spaces
  /// per level. `false` (compact mode) renders everything on one line with
  /// `,` rather than `, ` separators.
  pub pretty: bool,
  /// Spaces per level in pretty mode.
  pub indent: usize,
  /// Initial column in pretty mode.
  pub start_indent: usize,
  /// Emit `name: Type` for every record field, even when `Type` is `any`
  /// and would otherwise be omitted.
  pub include_type: bool,
  /// Wrap schema/punctuation/value tokens in ANSI SGR codes from
  /// [`crate::ansi`].
  pub colorize: bool,
  /// Render `\n \r \t` inside string values as escape sequences rather than
  /// literal control characters.
  pub escape_new_lines: bool,
  /// Emit the leading schema header.
  pub include_schema: bool,
  /// Emit `$attr`/`#tag`/`!required` metadata.
  pub include_meta: bool,
  /// Emit `/* ... */` comments.
  pub include_comments: bool,
  /// Inject `$size=<n>` into a list's instance metadata, `n` being its
  /// element count.
  pub include_array_size: bool,
  /// Render a `promptOutput`-style blueprint instead of data: `{ key:
  /// <type> }` for records, and a single representative element followed
  /// by a repeat-pattern comment for lists.
  pub blueprint: bool,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      pretty: false,
      indent: 2,
      start_indent: 0,
      include_type: false,
      colorize: false,
      escape_new_lines: true,
      include_schema: true,
      include_meta: true,
      include_comments: true,
      include_array_size: false,
      blueprint: false,
    }
  }
}

impl Config {
  pub fn with_pretty(mut self, pretty: bool) -> Self {
    self.pretty = pretty;
    self
  }

  pub fn with_indent(mut self, indent: usize) -> Self {
    self.indent = indent;
    self
  }

  pub fn with_start_indent(mut self, start_indent: usize) -> Self {
    self.start_indent = start_indent;
    self
  }

  pub fn with_include_type(mut self, include_type: bool) -> Self {
    self.include_type = include_type;
    self
  }

  pub fn with_colorize(mut self, colorize: bool) -> Self {
    self.colorize = colorize;
    self
  }

  pub fn with_escape_new_lines(mut self, escape_new_lines: bool) -> Self {
    self.escape_new_lines = escape_new_lines;
    self
  }

  pub fn with_include_schema(mut self, include_schema: bool) -> Self {
    self.include_schema = include_schema;
    self
  }

  pub fn with_include_meta(mut self, include_meta: bool) -> Self {
    self.include_meta = include_meta;
    self
  }

  pub fn with_include_comments(mut self, include_comments: bool) -> Self {
    self.include_comments = include_comments;
    self
  }

  pub fn with_include_array_size(mut self, include_array_size: bool) -> Self {
    self.include_array_size = include_array_size;
    self
  }

  pub fn with_blueprint(mut self, blueprint: bool) -> Self {
    self.blueprint = blueprint;
    self
  }
}

/// What [`encode`] can render: a node already built, or a plain value to be
/// routed through [`crate::builder::parse`] first — this is what lets a
/// caller holding a `serde_json::Value` call `encode` directly instead of
/// having to know about the node builder.
pub enum EncodeInput<'a> {
  Node(&'a Node),
  Value(Node),
}

impl<'a> From<&'a Node> for EncodeInput<'a> {
  fn from(node: &'a Node) -> Self {
    EncodeInput::Node(node)
  }
}

impl<'b> From<&'b serde_json::Value> for EncodeInput<'static> {
  fn from(value: &'b serde_json::Value) -> Self {
    EncodeInput::Value(build_or_null(value))
  }
}

impl From<serde_json::Value> for EncodeInput<'static> {
  fn from(value: serde_json::Value) -> Self {
    EncodeInput::Value(build_or_null(&value))
  }
}

/// The node builder only fails on a non-finite JSON number, which
/// `serde_json` itself never produces when parsing real JSON text. `encode`
/// is specified as total, so that edge case renders as `null` rather than
/// making `encode` fallible for everyone else.
fn build_or_null(value: &serde_json::Value) -> Node {
  builder::parse(value).unwrap_or_else(|_| Node::primitive(SchemaDescriptor::primitive("null"), Scalar::Null))
}

/// Renders `input` (a node, or a plain value built via the node builder) to
/// AKD text under `config`.
pub fn encode<'a>(input: impl Into<EncodeInput<'a>>, config: &Config) -> String {
  let input = input.into();
  let node: &Node = match &input {
    EncodeInput::Node(n) => n,
    EncodeInput::Value(n) => n,
  };

  let span = tracing::debug_span!("akd_encode", blueprint = config.blueprint);
  let _enter = span.enter();

  let mut out = String::new();
  if config.blueprint {
    render_blueprint(node, config, 0, &mut out);
    return out;
  }

  let mut emitted = HashSet::new();
  if config.include_schema && !header_is_trivial(&node.schema) {
    render_header(&node.schema, config, &mut emitted, &mut out);
  }
  render_value(node, config, 0, &mut out);
  out
}

fn header_is_trivial(schema: &SchemaRef) -> bool {
  let s = schema.borrow();
  s.is_any() && s.meta.is_empty()
}

fn schema_ptr(schema: &SchemaRef) -> usize {
  Rc::as_ptr(schema) as usize
}

fn colorize_token(config: &Config, token: Token, text: &str) -> String {
  if config.colorize {
    ansi::wrap(token, text)
  } else {
    text.to_string()
  }
}

fn escape_ident(name: &str) -> String {
  let is_plain = !name.is_empty()
    && name
      .chars()
      .next()
      .map(|c| c.is_ascii_alphabetic() || c == '_')
      .unwrap_or(false)
    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
  if is_plain {
    name.to_string()
  } else {
    format!("`{}`", name.replace('`', "\\`"))
  }
}

/// Renders `<...>` (optionally `@Name<...>`) for `schema`, short-circuiting
/// to a bare `@Name` reference for a named record already emitted earlier
/// in this call — this is what keeps cyclic schemas like `@Tree<children:
/// [@Tree]>` from recursing forever.
fn render_header(schema: &SchemaRef, config: &Config, emitted: &mut HashSet<usize>, out: &mut String) {
  let is_named_record = {
    let s = schema.borrow();
    s.is_record() && s.type_name != "any"
  };
  if is_named_record {
    emitted.insert(schema_ptr(schema));
    out.push('@');
    out.push_str(&colorize_token(config, Token::Schema, &escape_ident(&schema.borrow().type_name)));
  }
  out.push_str(&colorize_token(config, Token::Punctuation, "<"));
  render_schema_contents(schema, config, emitted, out);
  out.push_str(&colorize_token(config, Token::Punctuation, ">"));
}

/// Renders a type reference the way it appears nested inside another
/// schema (a record field's type, or a list's element type): bare for
/// list/primitive/any (self-delimiting already — `[T]`, a plain name), and
/// `<...>` wrapped only for an inline anonymous record or a fresh named
/// one. A named record already emitted earlier in this call collapses to
/// a bare `@Name` reference — this is what keeps cyclic schemas like
/// `@Tree<children:[@Tree]>` from recursing forever.
fn render_type(schema: &SchemaRef, config: &Config, emitted: &mut HashSet<usize>, out: &mut String) {
  let ptr = schema_ptr(schema);
  let is_named_record = {
    let s = schema.borrow();
    s.is_record() && s.type_name != "any"
  };

  if is_named_record {
    out.push('@');
    out.push_str(&colorize_token(config, Token::Schema, &escape_ident(&schema.borrow().type_name)));
    if emitted.contains(&ptr) {
      return;
    }
    emitted.insert(ptr);
    out.push_str(&colorize_token(config, Token::Punctuation, "<"));
    render_schema_contents(schema, config, emitted, out);
    out.push_str(&colorize_token(config, Token::Punctuation, ">"));
    return;
  }

  if schema.borrow().is_record() {
    out.push_str(&colorize_token(config, Token::Punctuation, "<"));
    render_schema_contents(schema, config, emitted, out);
    out.push_str(&colorize_token(config, Token::Punctuation, ">"));
    return;
  }

  // List and primitive/any shapes are self-delimiting already.
  render_schema_contents(schema, config, emitted, out);
}

fn render_schema_contents(schema: &SchemaRef, config: &Config, emitted: &mut HashSet<usize>, out: &mut String) {
  let is_list = schema.borrow().is_list();
  if is_list {
    out.push_str(&colorize_token(config, Token::Punctuation, "["));
    if let Some(element) = schema.borrow().element() {
      if !element.borrow().is_any() {
        let is_named_record = {
          let e = element.borrow();
          e.is_record() && e.type_name != "any"
        };
        if element.borrow().is_record() && !is_named_record {
          // The list's own brackets already delimit the element: an
          // anonymous record's fields sit bare inside them, with no
          // extra `<...>` wrapper (`[name:string,val:number]`, not
          // `[<name:string,val:number>]`).
          render_schema_contents(&element, config, emitted, out);
        } else {
          render_type(&element, config, emitted, out);
        }
      }
      let mut effective_meta = element.borrow().meta.clone();
      effective_meta.apply(&schema.borrow().meta);
      if !effective_meta.is_empty() {
        out.push(' ');
        render_meta_wrapped(&effective_meta, config, out);
      }
    }
    out.push_str(&colorize_token(config, Token::Punctuation, "]"));
    return;
  }

  let is_record = schema.borrow().is_record();
  if is_record {
    let fields: Vec<SchemaRef> = schema.borrow().fields().to_vec();
    for (i, field) in fields.iter().enumerate() {
      if i > 0 {
        out.push_str(&colorize_token(config, Token::Punctuation, ","));
      }
      let name = field.borrow().name.clone().unwrap_or_default();
      out.push_str(&escape_ident(&name));
      let is_any_field = field.borrow().is_any();
      if config.include_type || !is_any_field {
        out.push_str(&colorize_token(config, Token::Punctuation, ":"));
        render_type(field, config, emitted, out);
      }
      render_meta_inline_after(&field.borrow().meta, config, out);
    }
    if !schema.borrow().meta.is_empty() {
      out.push(' ');
      render_meta_wrapped(&schema.borrow().meta, config, out);
    }
    return;
  }

  render_meta_inline_before(&schema.borrow().meta, config, out);
  let type_name = schema.borrow().type_name.clone();
  out.push_str(&colorize_token(config, Token::Schema, &type_name));
}

/// Builds the inline token sequence shared by both meta renderings:
/// `!required`, then `#tags`, then `$key=value` attributes (a `true` value
/// renders as the bare `$key`) when `include_meta` is on, then
/// `/* comments */` when `include_comments` is on. `None` when nothing
/// survives those two gates.
fn meta_tokens(meta: &Meta, config: &Config) -> Option<Vec<String>> {
  let mut tokens = Vec::new();
  if config.include_meta {
    if meta.required {
      tokens.push("!required".to_string());
    }
    for tag in &meta.tags {
      tokens.push(format!("#{}", escape_ident(tag)));
    }
    for (key, value) in meta.attributes.iter() {
      match value {
        AttrValue::Bool(true) => tokens.push(format!("${}", escape_ident(key))),
        other => tokens.push(format!("${}={}", escape_ident(key), other.render())),
      }
    }
  }
  if config.include_comments {
    for comment in &meta.comments {
      tokens.push(format!("/* {} */", comment));
    }
  }
  if tokens.is_empty() {
    None
  } else {
    Some(tokens)
  }
}

/// Renders metadata attached to a container (a schema or a data value) as a
/// `//...//` wrapped block, with no surrounding spaces — callers add
/// whatever separator fits their position. Returns whether anything was
/// written.
fn render_meta_wrapped(meta: &Meta, config: &Config, out: &mut String) -> bool {
  let tokens = match meta_tokens(meta, config) {
    Some(t) => t,
    None => return false,
  };
  let body = tokens.join(" ");
  let text = if config.pretty {
    format!("// {} //", body)
  } else {
    format!("//{}//", body)
  };
  out.push_str(&colorize_token(config, Token::Meta, &text));
  true
}

/// Renders metadata that decorates a single token inline, unwrapped,
/// preceded by a separating space, trailing the token it decorates (a
/// record field's type, a schema primitive's meta when following the type
/// it's already been placed ahead of).
fn render_meta_inline_after(meta: &Meta, config: &Config, out: &mut String) {
  if let Some(tokens) = meta_tokens(meta, config) {
    out.push(' ');
    out.push_str(&colorize_token(config, Token::Meta, &tokens.join(" ")));
  }
}

/// Renders metadata that precedes the token it decorates, followed by a
/// separating space: a primitive schema's inline meta, or a scalar value's
/// own meta in the data body.
fn render_meta_inline_before(meta: &Meta, config: &Config, out: &mut String) {
  if let Some(tokens) = meta_tokens(meta, config) {
    out.push_str(&colorize_token(config, Token::Meta, &tokens.join(" ")));
    out.push(' ');
  }
}

fn indent_str(config: &Config, depth: usize) -> String {
  if config.pretty {
    format!("\n{}", " ".repeat(config.start_indent + config.indent * depth))
  } else {
    String::new()
  }
}

/// Renders the data body of `node`. `context` is the schema the node was
/// decoded/built against — when a child's own schema disagrees with the
/// context it's rendered under (see [`render_tagged_value`]), the child
/// gets an explicit `<Type>` tag so a round-trip decode recovers the same
/// per-node type.
fn render_value(node: &Node, config: &Config, depth: usize, out: &mut String) {
  if node.is_list() {
    out.push_str(&colorize_token(config, Token::Punctuation, "["));
    let elements = node.elements().unwrap();
    let mut instance_meta = node.meta.clone();
    if config.include_array_size {
      instance_meta.set_attribute("size", AttrValue::Number(elements.len() as f64));
    }
    if render_meta_wrapped(&instance_meta, config, out) && !config.pretty {
      out.push(' ');
    }
    let element_schema = node.schema.borrow().element();
    for (i, el) in elements.iter().enumerate() {
      if i > 0 {
        out.push_str(&colorize_token(config, Token::Punctuation, ","));
      }
      out.push_str(&indent_str(config, depth + 1));
      render_tagged_value(el, element_schema.as_ref(), config, depth + 1, out);
    }
    if config.pretty && !elements.is_empty() {
      out.push_str(&indent_str(config, depth));
    }
    out.push_str(&colorize_token(config, Token::Punctuation, "]"));
  } else if node.is_record() {
    out.push_str(&colorize_token(config, Token::Punctuation, "("));
    if render_meta_wrapped(&node.meta, config, out) && !config.pretty {
      out.push(' ');
    }
    let ordered = node.ordered_fields();
    if ordered.is_empty() {
      out.push_str(&colorize_token(config, Token::Keyword, "null"));
    } else {
      for (i, (name, child)) in ordered.iter().enumerate() {
        if i > 0 {
          out.push_str(&colorize_token(config, Token::Punctuation, ","));
        }
        out.push_str(&indent_str(config, depth + 1));
        let field_schema = node.schema.borrow().field(name);
        match child {
          Some(child) => render_tagged_value(child, field_schema.as_ref(), config, depth + 1, out),
          None => out.push_str(&colorize_token(config, Token::Keyword, "null")),
        }
      }
      if config.pretty {
        out.push_str(&indent_str(config, depth));
      }
    }
    out.push_str(&colorize_token(config, Token::Punctuation, ")"));
  } else {
    render_meta_inline_before(&node.meta, config, out);
    render_scalar(node.value().unwrap(), config, out);
  }
}

fn render_tagged_value(node: &Node, context: Option<&SchemaRef>, config: &Config, depth: usize, out: &mut String) {
  let mismatched = match context {
    Some(ctx) => {
      let c = ctx.borrow();
      let n = node.schema.borrow();
      !(c.is_any() || (c.kind == n.kind && c.type_name == n.type_name))
    }
    None => false,
  };
  if mismatched {
    out.push_str(&colorize_token(config, Token::Punctuation, "<"));
    out.push_str(&colorize_token(config, Token::Schema, &node.schema.borrow().type_name));
    out.push_str(&colorize_token(config, Token::Punctuation, ">"));
    out.push(' ');
  }
  render_value(node, config, depth, out);
}

fn render_scalar(scalar: &Scalar, config: &Config, out: &mut String) {
  match scalar {
    Scalar::Str(s) => out.push_str(&colorize_token(config, Token::String, &render_string(s, config))),
    Scalar::Number(n) => out.push_str(&colorize_token(config, Token::Number, &render_number(*n))),
    Scalar::Bool(b) => out.push_str(&colorize_token(config, Token::Keyword, &b.to_string())),
    Scalar::Null => out.push_str(&colorize_token(config, Token::Keyword, "null")),
    Scalar::Binary(bytes) => {
      let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
      out.push_str(&colorize_token(config, Token::String, &render_string(&hex, config)));
    }
  }
}

/// Quotes `s`. Quotes and backslashes are always escaped; `\n \r \t` escape
/// only when `escape_new_lines` is on, otherwise they pass through literally.
fn render_string(s: &str, config: &Config) -> String {
  if config.escape_new_lines {
    return format!("{:?}", s);
  }
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for c in s.chars() {
    match c {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      _ => out.push(c),
    }
  }
  out.push('"');
  out
}

/// Renders a `promptOutput`-style blueprint: a record becomes `{ key:
/// <type> }`, with the field's first comment (if any) attached after the
/// type slot; a list becomes its first element's blueprint followed by a
/// `/* repeat pattern for additional items */` note when it has more than
/// one element.
fn render_blueprint(node: &Node, config: &Config, depth: usize, out: &mut String) {
  if node.is_record() {
    out.push_str("{ ");
    let schema = node.schema.borrow();
    for (i, (name, child)) in node.ordered_fields().iter().enumerate() {
      if i > 0 {
        out.push_str(", ");
      }
      out.push_str(&escape_ident(name));
      out.push_str(": ");
      match child {
        Some(c) => render_blueprint(c, config, depth + 1, out),
        None => out.push_str("<any>"),
      }
      if let Some(field_schema) = schema.field(name) {
        if let Some(first) = field_schema.borrow().meta.comments.first() {
          out.push_str(&format!(" /* {} */", first));
        }
      }
    }
    out.push_str(" }");
  } else if node.is_list() {
    let elements = node.elements().unwrap();
    out.push('[');
    if let Some(first) = elements.first() {
      render_blueprint(first, config, depth + 1, out);
      if elements.len() > 1 {
        out.push_str(", /* repeat pattern for additional items */");
      }
    }
    out.push(']');
  } else {
    out.push('<');
    out.push_str(&node.schema.borrow().type_name);
    out.push('>');
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::builder::parse;
  use crate::decode::{decode, DecodeOptions};
  use crate::schema::SchemaDescriptor;
  use serde_json::json;

  #[test]
  fn renders_positional_record_with_inferred_types() {
    let node = parse(&json!({"x": 10, "y": 20})).unwrap();
    let text = encode(&node, &Config::default());
    assert_eq!(text, "<x:number,y:number>(10,20)");
  }

  #[test]
  fn omits_trivial_any_header() {
    let schema = SchemaDescriptor::any();
    let node = Node::primitive(schema, Scalar::Number(3.0));
    assert_eq!(encode(&node, &Config::default()), "3");
  }

  #[test]
  fn tags_mismatched_list_element_type() {
    let result = decode("<[any]>[\"a\",\"b\",\"c\",3]", DecodeOptions::default(), None);
    let text = encode(&result.node, &Config::default());
    assert_eq!(text, "<[string]>[\"a\",\"b\",\"c\",<number> 3]");
  }

  #[test]
  fn escapes_identifiers_needing_backticks() {
    let node = parse(&json!({"first name": "Ada"})).unwrap();
    let text = encode(&node, &Config::default());
    assert!(text.contains("`first name`"), "got {}", text);
  }

  #[test]
  fn blueprint_mode_renders_type_slots() {
    let node = parse(&json!({"id": 1, "tags": ["a", "b"]})).unwrap();
    let text = encode(&node, &Config::default().with_blueprint(true));
    assert_eq!(text, "{ id: <number>, tags: [<string>, /* repeat pattern for additional items */] }");
  }

  #[test]
  fn cyclic_named_schema_does_not_recurse_forever() {
    let result = decode("@Tree<label:string,children:[@Tree]>@Tree(\"root\",[])", DecodeOptions::default(), None);
    assert!(result.errors.is_empty());
    let text = encode(&result.node, &Config::default());
    assert!(text.starts_with("@Tree<"));
    assert!(text.contains("children:[@Tree]"));
  }

  #[test]
  fn empty_record_renders_null() {
    let schema = SchemaDescriptor::record();
    let node = Node::record(schema, std::collections::HashMap::new());
    assert_eq!(encode(&node, &Config::default()), "<>(null)");
  }

  #[test]
  fn encode_accepts_a_plain_value_directly() {
    let text = encode(&json!({"x": 10, "y": 20}), &Config::default());
    assert_eq!(text, "<x:number,y:number>(10,20)");
  }

  #[test]
  fn include_schema_false_omits_the_header() {
    let node = parse(&json!({"x": 10})).unwrap();
    let text = encode(&node, &Config::default().with_include_schema(false));
    assert_eq!(text, "(10)");
  }

  #[test]
  fn include_meta_false_omits_attributes_and_tags() {
    let result = decode("// $size=3 #big // [1, 2, 3]", DecodeOptions::default(), None);
    let text = encode(&result.node, &Config::default().with_include_meta(false));
    assert_eq!(text, "<[number]>[1,2,3]");
  }

  #[test]
  fn include_comments_false_omits_comments() {
    let result = decode("<x:number /* a note */>(1)", DecodeOptions::default(), None);
    let text = encode(&result.node, &Config::default().with_include_comments(false));
    assert_eq!(text, "<x:number>(1)");
  }

  #[test]
  fn include_array_size_injects_size_attribute() {
    let node = parse(&json!([1, 2, 3])).unwrap();
    let text = encode(&node, &Config::default().with_include_array_size(true));
    assert_eq!(text, "<[number]>[//$size=3// 1,2,3]");
  }

  #[test]
  fn escape_new_lines_false_keeps_raw_control_characters() {
    let node = parse(&json!("a\nb")).unwrap();
    let escaped = encode(&node, &Config::default());
    assert_eq!(escaped, "<string>\"a\\nb\"");
    let raw = encode(&node, &Config::default().with_escape_new_lines(false));
    assert_eq!(raw, "<string>\"a\nb\"");
  }
}
