//! Grammar-level parsing: schema definitions/references, schema bodies,
//! and the data-value dispatch. Built on the lexical primitives and
//! metadata handling in `cursor.rs`.

use super::cursor::{is_ident_start, Decoder};
use super::DiagnosticKind;
use crate::node::{Node, Scalar};
use crate::schema::{promote_element_meta, Kind, SchemaDescriptor, SchemaRef};
use std::collections::HashMap;

/// Every first character that legally opens a data value: a schema tag, a
/// container delimiter, or a scalar literal's lead character.
fn is_value_start(c: char) -> bool {
  matches!(c, '@' | '<' | '[' | '(' | '{' | '"' | '-' | '`') || c.is_ascii_digit() || is_ident_start(c)
}

impl Decoder {
  /// A document is an optional sequence of schema definitions
  /// (`@Name<...>`) or references (`@Name`, bare `<...>`) followed by
  /// exactly one data value, which inherits whichever schema context was
  /// most recently established.
  pub(crate) fn parse_document(&mut self) -> (SchemaRef, Node) {
    let mut context: Option<SchemaRef> = None;
    loop {
      self.skip_ws_and_meta();
      if self.eof() {
        self.push_error(DiagnosticKind::UnexpectedEofNode, "Unexpected EOF while expecting a node".to_string());
        let schema = context.unwrap_or_else(SchemaDescriptor::any);
        return (schema.clone(), Node::primitive(schema, Scalar::Null));
      }
      match self.peek().unwrap() {
        '@' => {
          let schema = self.parse_named_schema_or_reference();
          context = Some(schema);
        }
        '<' => {
          let schema = SchemaDescriptor::any();
          self.parse_schema_body(&schema);
          context = Some(schema);
        }
        _ => {
          let ctx = context.unwrap_or_else(SchemaDescriptor::any);
          let node = self.parse_value(Some(ctx.clone()));
          return (ctx, node);
        }
      }

      self.skip_ws_and_meta();
      if !(self.eof() || self.peek() == Some('@')) {
        let ctx = context.clone().unwrap();
        let node = self.parse_value(Some(ctx.clone()));
        return (ctx, node);
      }
    }
  }

  /// Parses `@Name` followed by either `<...>` (a definition — registered
  /// under `Name`, first write wins) or nothing (a reference, resolved
  /// against the registry).
  fn parse_named_schema_or_reference(&mut self) -> SchemaRef {
    self.advance(); // '@'
    let name = self.read_identifier();
    self.skip_ws_and_meta();
    if self.peek() == Some('<') {
      if let Some(existing) = self.registry.get(&name).cloned() {
        let scratch = SchemaDescriptor::any();
        self.parse_schema_body(&scratch);
        existing
      } else {
        let schema = SchemaDescriptor::any();
        self.registry.insert(name.clone(), schema.clone());
        self.parse_schema_body(&schema);
        if schema.borrow().is_record() {
          schema.borrow_mut().type_name = name;
        }
        schema
      }
    } else {
      match self.registry.get(&name).cloned() {
        Some(existing) => existing,
        None => {
          self.push_error(DiagnosticKind::UnexpectedChar, format!("Unknown schema reference: @{}", name));
          SchemaDescriptor::any()
        }
      }
    }
  }

  /// Parses a `<...>` schema body into `schema`, consuming both delimiters.
  fn parse_schema_body(&mut self, schema: &SchemaRef) {
    self.expect_char('<');
    self.parse_schema_contents(schema, '>');
    self.expect_char('>');
  }

  /// Parses the interior of a schema body up to (not including) `closing`:
  /// either a `[element]` list shape, or a comma-separated field list which
  /// may collapse to a single primitive-type shorthand (`<number>`).
  fn parse_schema_contents(&mut self, schema: &SchemaRef, closing: char) {
    self.skip_ws_and_meta();
    let container_meta = self.take_pending_meta();
    schema.borrow_mut().apply_meta(&container_meta);

    if self.eof() {
      self.push_error(
        DiagnosticKind::UnexpectedEof,
        format!("Unexpected EOF: schema not closed, expected '{}'", closing),
      );
      return;
    }

    if self.peek() == Some('[') {
      self.advance();
      schema.borrow_mut().clear_fields();
      schema.borrow_mut().kind = Kind::List;
      let element = self.parse_list_body();
      self.expect_char(']');
      schema.borrow_mut().set_element(element);
      promote_element_meta(schema);
      return;
    }

    loop {
      self.skip_ws_and_meta();
      if self.eof() {
        self.push_error(
          DiagnosticKind::UnexpectedEof,
          format!("Unexpected EOF: schema not closed, expected '{}'", closing),
        );
        return;
      }
      if self.peek() == Some(closing) {
        let trailing = self.take_pending_meta();
        schema.borrow_mut().apply_meta(&trailing);
        return;
      }

      let field_meta_before = self.take_pending_meta();
      let name_token = self.read_identifier();
      if name_token.is_empty() {
        if let Some(c) = self.peek() {
          self.push_error(DiagnosticKind::UnexpectedChar, format!("Unexpected character '{}'", c));
          self.advance();
        }
        continue;
      }

      self.skip_ws_and_meta();
      if self.peek() == Some(':') {
        self.advance();
        self.skip_ws_and_meta();
        let field_schema = self.parse_type();
        field_schema.borrow_mut().name = Some(name_token.clone());
        field_schema.borrow_mut().apply_meta(&field_meta_before);
        self.skip_ws_and_meta();
        let trailing = self.take_pending_meta();
        field_schema.borrow_mut().apply_meta(&trailing);
        schema.borrow_mut().replace_field(&name_token, field_schema);
      } else if schema.borrow().field_count() == 0
        && (self.peek() == Some(closing) || self.eof())
      {
        let trailing = self.take_pending_meta();
        let canonical_schema = SchemaDescriptor::primitive(&name_token);
        schema.borrow_mut().kind = canonical_schema.borrow().kind;
        schema.borrow_mut().type_name = canonical_schema.borrow().type_name.clone();
        schema.borrow_mut().apply_meta(&field_meta_before);
        schema.borrow_mut().apply_meta(&trailing);
      } else {
        let trailing = self.take_pending_meta();
        let field_schema = SchemaDescriptor::any();
        field_schema.borrow_mut().name = Some(name_token.clone());
        field_schema.borrow_mut().apply_meta(&field_meta_before);
        field_schema.borrow_mut().apply_meta(&trailing);
        schema.borrow_mut().replace_field(&name_token, field_schema);
      }

      self.skip_ws_and_meta();
      match self.peek() {
        Some(',') => {
          self.advance();
        }
        Some(c) if c == closing => {}
        None => {}
        Some(c) => {
          self.push_error(DiagnosticKind::UnexpectedChar, format!("Unexpected character '{}'", c));
          self.advance();
        }
      }
    }
  }

  /// Parses a type reference: `@Name`, `<...>`, bare `[element]`, or a
  /// plain primitive name.
  fn parse_type(&mut self) -> SchemaRef {
    self.skip_ws_and_meta();
    match self.peek() {
      Some('@') => self.parse_named_schema_or_reference(),
      Some('<') => {
        let schema = SchemaDescriptor::any();
        self.parse_schema_body(&schema);
        schema
      }
      Some('[') => {
        self.advance();
        let element = self.parse_list_body();
        self.expect_char(']');
        let list = SchemaDescriptor::list(element);
        promote_element_meta(&list);
        list
      }
      Some(c) if is_ident_start(c) || c == '`' => {
        let name = self.read_identifier();
        SchemaDescriptor::primitive(name)
      }
      _ => {
        self.push_error(DiagnosticKind::ExpectedChar, "Expected a type".to_string());
        SchemaDescriptor::any()
      }
    }
  }

  /// Parses the interior of a `[...]` list-element type (the opening `[`
  /// must already be consumed): a single type reference, or nothing at all
  /// for an empty `[]` (meaning an `any` element).
  fn parse_list_body(&mut self) -> SchemaRef {
    self.skip_ws_and_meta();
    let container_meta = self.take_pending_meta();
    if self.eof() || self.peek() == Some(']') {
      let any = SchemaDescriptor::any();
      any.borrow_mut().apply_meta(&container_meta);
      return any;
    }
    let element = self.parse_type();
    element.borrow_mut().apply_meta(&container_meta);
    self.skip_ws_and_meta();
    let trailing = self.take_pending_meta();
    element.borrow_mut().apply_meta(&trailing);
    element
  }

  /// Dispatches on the next non-meta character to parse a data value,
  /// optionally typed by `context`. `@`/`<` introduce an inline or
  /// referenced schema that becomes the context for the value nested
  /// beneath it.
  pub(crate) fn parse_value(&mut self, context: Option<SchemaRef>) -> Node {
    self.skip_ws_and_meta();
    // A character that starts none of the known value forms is reported
    // and skipped, one at a time, rather than abandoning the document —
    // this is what lets a run of garbage tokens accumulate one error each
    // up to the diagnostics cap instead of stopping after the first.
    while !self.eof() && !is_value_start(self.peek().unwrap()) {
      let c = self.peek().unwrap();
      self.push_error(DiagnosticKind::UnexpectedChar, format!("Unexpected character '{}'", c));
      self.advance();
      self.skip_ws_and_meta();
    }
    if self.eof() {
      self.push_error(DiagnosticKind::UnexpectedEofNode, "Unexpected EOF while expecting a node".to_string());
      let schema = context.unwrap_or_else(SchemaDescriptor::any);
      return Node::primitive(schema, Scalar::Null);
    }
    let value_meta = self.take_pending_meta();
    let mut node = match self.peek().unwrap() {
      '@' | '<' => {
        let schema = if self.peek() == Some('@') {
          self.parse_named_schema_or_reference()
        } else {
          let s = SchemaDescriptor::any();
          self.parse_schema_body(&s);
          s
        };
        self.parse_value(Some(schema))
      }
      '[' => self.parse_list(context),
      '(' => self.parse_positional_record(context),
      '{' => self.parse_named_record(context),
      _ => self.parse_scalar(context),
    };
    node.meta.apply(&value_meta);
    node
  }

  fn parse_scalar(&mut self, context: Option<SchemaRef>) -> Node {
    let scalar = match self.peek().unwrap() {
      '"' => Scalar::Str(self.read_quoted_string()),
      c if c == '-' || c.is_ascii_digit() => Scalar::Number(self.read_number()),
      _ => {
        let word = self.read_identifier();
        match word.as_str() {
          "true" => Scalar::Bool(true),
          "false" => Scalar::Bool(false),
          "null" => Scalar::Null,
          _ => Scalar::Str(word),
        }
      }
    };
    let inferred_type = scalar.type_name().to_string();

    match context {
      Some(ctx) => {
        let compatible = {
          let c = ctx.borrow();
          c.is_any() || (c.is_primitive() && c.type_name == inferred_type)
        };
        if compatible {
          if ctx.borrow().is_any() {
            ctx.borrow_mut().kind = Kind::Primitive;
            ctx.borrow_mut().type_name = inferred_type;
          }
          Node::primitive(ctx, scalar)
        } else {
          Node::primitive(SchemaDescriptor::primitive(inferred_type), scalar)
        }
      }
      None => Node::primitive(SchemaDescriptor::primitive(inferred_type), scalar),
    }
  }

  /// `[...]`. The context (or a fresh `any`-element list, if none) becomes
  /// the list's schema; while its element schema is still `any`, it widens
  /// to the first element's actual schema.
  fn parse_list(&mut self, context: Option<SchemaRef>) -> Node {
    self.advance(); // '['
    let schema = match context {
      Some(ctx) => {
        if !ctx.borrow().is_list() {
          ctx.borrow_mut().kind = Kind::List;
          ctx.borrow_mut().clear_fields();
        }
        if ctx.borrow().element().is_none() {
          ctx.borrow_mut().set_element(SchemaDescriptor::any());
        }
        ctx
      }
      None => SchemaDescriptor::list(SchemaDescriptor::any()),
    };

    // Metadata encountered at the value level (inside this `[...]`, not
    // inside a schema body) describes this list instance, not its schema —
    // it ends up on the node, not `schema.meta`.
    self.skip_ws_and_meta();
    let mut node_meta = self.take_pending_meta();

    let mut elements = Vec::new();
    loop {
      self.skip_ws_and_meta();
      if self.eof() {
        self.push_error(DiagnosticKind::UnexpectedEof, "Unexpected EOF: list not closed".to_string());
        break;
      }
      if self.peek() == Some(']') {
        let trailing = self.take_pending_meta();
        node_meta.apply(&trailing);
        self.advance();
        break;
      }

      let element_context = schema.borrow().element();
      let widen = elements.is_empty()
        && element_context.as_ref().is_some_and(|e| e.borrow().is_any());
      let child = self.parse_value(element_context);
      if widen {
        schema.borrow_mut().set_element(child.schema.clone());
      }
      elements.push(child);

      // Metadata trailing the child but before its separator flushes onto
      // the container here, rather than riding forward to decorate the
      // next element — a stray `//$a=1//` between a value and its comma
      // describes the list, not whatever comes after the comma.
      self.skip_ws_and_meta();
      let trailing = self.take_pending_meta();
      node_meta.apply(&trailing);
      match self.peek() {
        Some(',') => {
          self.advance();
        }
        Some(']') => {}
        None => {}
        Some(c) => {
          self.push_error(DiagnosticKind::UnexpectedChar, format!("Unexpected character '{}'", c));
          self.advance();
        }
      }
    }

    promote_element_meta(&schema);
    let mut node = Node::list(schema, elements);
    node.meta = node_meta;
    node
  }

  /// `(...)`. Children are matched by ordinal against the context's
  /// existing fields; when none exists at that ordinal, a field named
  /// `_0`, `_1`, ... is synthesized from the child's inferred schema.
  fn parse_positional_record(&mut self, context: Option<SchemaRef>) -> Node {
    self.advance(); // '('
    let schema = match context {
      Some(ctx) => {
        if !ctx.borrow().is_record() {
          ctx.borrow_mut().kind = Kind::Record;
        }
        ctx
      }
      None => SchemaDescriptor::record(),
    };

    self.skip_ws_and_meta();
    let mut node_meta = self.take_pending_meta();

    let mut fields = HashMap::new();
    let mut ordinal = 0usize;
    loop {
      self.skip_ws_and_meta();
      if self.eof() {
        self.push_error(DiagnosticKind::UnexpectedEof, "Unexpected EOF: record not closed".to_string());
        break;
      }
      if self.peek() == Some(')') {
        let trailing = self.take_pending_meta();
        node_meta.apply(&trailing);
        self.advance();
        break;
      }

      let existing_field_schema = schema.borrow().field_at(ordinal);
      let child = self.parse_value(existing_field_schema.clone());
      let field_name = match existing_field_schema {
        Some(fs) => fs.borrow().name.clone().unwrap_or_else(|| ordinal.to_string()),
        None => {
          let synthetic_name = format!("_{}", ordinal);
          let field_schema = child.schema.clone();
          field_schema.borrow_mut().name = Some(synthetic_name.clone());
          schema.borrow_mut().add_field(field_schema);
          synthetic_name
        }
      };
      fields.insert(field_name, child);
      ordinal += 1;

      self.skip_ws_and_meta();
      let trailing = self.take_pending_meta();
      node_meta.apply(&trailing);
      match self.peek() {
        Some(',') => {
          self.advance();
        }
        Some(')') => {}
        None => {}
        Some(c) => {
          self.push_error(DiagnosticKind::UnexpectedChar, format!("Unexpected character '{}'", c));
          self.advance();
        }
      }
    }

    let mut node = Node::record(schema, fields);
    node.meta = node_meta;
    node
  }

  /// `{...}`. Children are matched by key against the context's fields;
  /// an `any` field schema matched this way widens to the child's actual
  /// schema. Unmatched keys get a new field appended.
  fn parse_named_record(&mut self, context: Option<SchemaRef>) -> Node {
    self.advance(); // '{'
    let schema = match context {
      Some(ctx) => {
        if !ctx.borrow().is_record() {
          ctx.borrow_mut().kind = Kind::Record;
        }
        ctx
      }
      None => SchemaDescriptor::record(),
    };

    self.skip_ws_and_meta();
    let mut node_meta = self.take_pending_meta();

    let mut fields = HashMap::new();
    loop {
      self.skip_ws_and_meta();
      if self.eof() {
        self.push_error(DiagnosticKind::UnexpectedEof, "Unexpected EOF: record not closed".to_string());
        break;
      }
      if self.peek() == Some('}') {
        let trailing = self.take_pending_meta();
        node_meta.apply(&trailing);
        self.advance();
        break;
      }

      let key = if self.peek() == Some('"') {
        self.read_quoted_string()
      } else {
        self.read_identifier()
      };

      self.skip_ws_and_meta();
      if self.peek() == Some(':') {
        self.advance();
      } else {
        self.push_error(DiagnosticKind::ExpectedChar, "Expected ':'".to_string());
      }

      let existing = schema.borrow().field(&key);
      let child = self.parse_value(existing.clone());

      match existing {
        Some(existing_schema) => {
          if existing_schema.borrow().is_any() && !child.schema.borrow().is_any() {
            let replacement = child.schema.clone();
            replacement.borrow_mut().name = Some(key.clone());
            schema.borrow_mut().replace_field(&key, replacement);
          }
        }
        None => {
          let field_schema = child.schema.clone();
          field_schema.borrow_mut().name = Some(key.clone());
          schema.borrow_mut().add_field(field_schema);
        }
      }
      fields.insert(key, child);

      self.skip_ws_and_meta();
      let trailing = self.take_pending_meta();
      node_meta.apply(&trailing);
      match self.peek() {
        Some(',') => {
          self.advance();
        }
        Some('}') => {}
        None => {}
        Some(c) => {
          self.push_error(DiagnosticKind::UnexpectedChar, format!("Unexpected character '{}'", c));
          self.advance();
        }
      }
    }

    let mut node = Node::record(schema, fields);
    node.meta = node_meta;
    node
  }
}

#[cfg(test)]
mod test {
  use super::super::{decode, DecodeOptions};

  fn assert_ok(input: &str) -> super::super::DecodeResult {
    let result = decode(input, DecodeOptions::default(), None);
    assert!(result.errors.is_empty(), "unexpected errors for {:?}: {:?}", input, result.errors.iter().map(|e| &e.message).collect::<Vec<_>>());
    result
  }

  #[test]
  fn decodes_implicit_positional_record() {
    let result = assert_ok("<x:number,y:number>(10,20)");
    let node = result.node;
    assert_eq!(node.field("x").unwrap().value().unwrap(), &crate::node::Scalar::Number(10.0));
    assert_eq!(node.field("y").unwrap().value().unwrap(), &crate::node::Scalar::Number(20.0));
  }

  #[test]
  fn decodes_named_record_without_schema() {
    let result = assert_ok("{x:1,y:2}");
    assert_eq!(result.schema.borrow().field_count(), 2);
  }

  #[test]
  fn widens_any_list_element_to_first_child() {
    let result = assert_ok("<[any]>[\"a\",\"b\",\"c\"]");
    assert_eq!(result.schema.borrow().element().unwrap().borrow().type_name, "string");
  }

  #[test]
  fn mismatched_list_element_keeps_own_schema() {
    let result = assert_ok("<[any]>[\"a\",\"b\",\"c\",3]");
    let elements = result.node.elements().unwrap();
    assert_eq!(elements[3].schema.borrow().type_name, "number");
    assert_eq!(result.schema.borrow().element().unwrap().borrow().type_name, "string");
  }

  #[test]
  fn nested_list_of_lists() {
    let result = assert_ok("<[[int]]>[[2,3,4],[5,6,7]]");
    let element = result.schema.borrow().element().unwrap();
    assert!(element.borrow().is_list());
    assert_eq!(element.borrow().element().unwrap().borrow().type_name, "number");
  }

  #[test]
  fn self_referential_named_schema() {
    let result = assert_ok("@Tree<label:string,children:[@Tree]>@Tree(\"root\",[])");
    let children_field = result.schema.borrow().field("children").unwrap();
    let element = children_field.borrow().element().unwrap();
    assert!(std::rc::Rc::ptr_eq(&element, &result.schema));
  }

  #[test]
  fn backtick_identifier_and_comment_round_trip_inputs() {
    let result = assert_ok("<`first name`:string>/* a person's name */(\"Ada\")");
    assert_eq!(result.node.field("first name").unwrap().value().unwrap(), &crate::node::Scalar::Str("Ada".to_string()));
  }

  #[test]
  fn implicit_attribute_warns() {
    let result = decode("// size=3 //[1,2,3]", DecodeOptions::default(), None);
    assert!(result.warnings.iter().any(|w| w.kind == super::super::DiagnosticKind::ImplicitAttribute));
  }

  #[test]
  fn unknown_flag_warns() {
    let result = decode("<x:number !weird>(1)", DecodeOptions::default(), None);
    assert!(result.warnings.iter().any(|w| w.kind == super::super::DiagnosticKind::UnknownFlag));
  }

  #[test]
  fn unterminated_list_reports_error_without_panicking() {
    let result = decode("[1, 2, 3", DecodeOptions::default(), None);
    assert!(!result.errors.is_empty());
  }
}
