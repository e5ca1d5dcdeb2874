//! The `schema` module implements the schema descriptor: a tagged shape
//! (`Primitive`, `List`, `Record`, `Any`) with its own metadata and an
//! optional nominal type name.
//!
//! Named types (`@User`) are shared through [`SchemaRef`], a reference count
//! into the decoder's registry, rather than cloned at each use site — two
//! `@User` references must be the *same* descriptor so that cyclic shapes
//! like `@Tree<children:[@Tree]>` are representable at all.

use crate::meta::Meta;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a schema descriptor. Single-threaded only — see the
/// concurrency notes on [`crate::decode`] and [`crate::encode`].
pub type SchemaRef = Rc<RefCell<SchemaDescriptor>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
  Primitive,
  Record,
  List,
  Any,
}

/// A schema descriptor: the structural type of a value.
#[derive(Debug)]
pub struct SchemaDescriptor {
  pub kind: Kind,
  /// The primitive type name (`string`, `number`, ...) or the record's
  /// nominal type name (`User`, ...). Defaults to `"any"`.
  pub type_name: String,
  /// Set when this schema is used as a named field inside a record.
  pub name: Option<String>,
  /// List element schema. `None` unless `kind == List`.
  element: Option<SchemaRef>,
  /// Record fields, in declaration order.
  fields: Vec<SchemaRef>,
  /// Name -> ordinal index into `fields`. Must stay consistent with
  /// `fields`; every mutator below maintains that invariant.
  field_index: HashMap<String, usize>,
  pub meta: Meta,
}

/// Resolves primitive type aliases to their canonical name: `int`/`float`
/// both canonicalize to `number`; everything else passes through unchanged.
pub fn canonical_primitive_name(name: &str) -> &str {
  match name {
    "int" | "float" => "number",
    other => other,
  }
}

impl SchemaDescriptor {
  fn new(kind: Kind) -> Self {
    SchemaDescriptor {
      kind,
      type_name: "any".to_string(),
      name: None,
      element: None,
      fields: Vec::new(),
      field_index: HashMap::new(),
      meta: Meta::new(),
    }
  }

  pub fn new_ref(kind: Kind) -> SchemaRef {
    Rc::new(RefCell::new(SchemaDescriptor::new(kind)))
  }

  pub fn any() -> SchemaRef {
    SchemaDescriptor::new_ref(Kind::Any)
  }

  pub fn primitive(type_name: impl AsRef<str>) -> SchemaRef {
    let schema = SchemaDescriptor::new_ref(Kind::Primitive);
    schema.borrow_mut().type_name =
      canonical_primitive_name(type_name.as_ref()).to_string();
    schema
  }

  pub fn list(element: SchemaRef) -> SchemaRef {
    let schema = SchemaDescriptor::new_ref(Kind::List);
    schema.borrow_mut().element = Some(element);
    schema
  }

  pub fn record() -> SchemaRef {
    SchemaDescriptor::new_ref(Kind::Record)
  }

  pub fn element(&self) -> Option<SchemaRef> {
    self.element.clone()
  }

  pub fn set_element(&mut self, element: SchemaRef) {
    self.kind = Kind::List;
    self.element = Some(element);
  }

  pub fn fields(&self) -> &[SchemaRef] {
    &self.fields
  }

  pub fn field_count(&self) -> usize {
    self.fields.len()
  }

  pub fn field_at(&self, ordinal: usize) -> Option<SchemaRef> {
    self.fields.get(ordinal).cloned()
  }

  pub fn field(&self, name: &str) -> Option<SchemaRef> {
    self.field_index.get(name).map(|&i| self.fields[i].clone())
  }

  /// Appends `field` to this schema's field list, auto-promoting `Any` to
  /// `Record` on the first call and auto-naming the field by its ordinal
  /// position if it has no name yet.
  pub fn add_field(&mut self, field: SchemaRef) {
    self.kind = Kind::Record;
    let ordinal = self.fields.len();
    {
      let mut f = field.borrow_mut();
      if f.name.is_none() {
        f.name = Some(ordinal.to_string());
      }
    }
    let name = field.borrow().name.clone().expect("field just named above");
    self.field_index.insert(name, ordinal);
    self.fields.push(field);
  }

  /// Replaces the field named `name` with `field`, preserving its ordinal
  /// position; appends if no field with that name exists yet.
  pub fn replace_field(&mut self, name: &str, field: SchemaRef) {
    self.kind = Kind::Record;
    field.borrow_mut().name = Some(name.to_string());
    match self.field_index.get(name).copied() {
      Some(idx) => self.fields[idx] = field,
      None => {
        let idx = self.fields.len();
        self.field_index.insert(name.to_string(), idx);
        self.fields.push(field);
      }
    }
  }

  pub fn clear_fields(&mut self) {
    self.fields.clear();
    self.field_index.clear();
  }

  pub fn is_primitive(&self) -> bool {
    matches!(self.kind, Kind::Primitive)
  }

  pub fn is_record(&self) -> bool {
    matches!(self.kind, Kind::Record)
  }

  pub fn is_list(&self) -> bool {
    matches!(self.kind, Kind::List)
  }

  /// True when this schema carries no more type information than `any`:
  /// explicitly `Kind::Any`, or a primitive explicitly typed `any`. A
  /// record or list is never `any` once it holds that shape, regardless of
  /// its `type_name` placeholder — `add_field`/`set_element` committing to
  /// a shape is exactly what `is_any` needs to stop being true for.
  pub fn is_any(&self) -> bool {
    match self.kind {
      Kind::Any => true,
      Kind::Primitive => self.type_name == "any",
      Kind::Record | Kind::List => false,
    }
  }

  pub fn required(&self) -> bool {
    self.meta.required
  }

  /// Merges `meta` into this schema's own metadata (comments append,
  /// attributes overwrite by key, tags append, `required` OR-combines).
  pub fn apply_meta(&mut self, meta: &Meta) {
    self.meta.apply(meta);
  }
}

impl std::ops::Index<usize> for SchemaDescriptor {
  type Output = SchemaRef;
  fn index(&self, ordinal: usize) -> &SchemaRef {
    &self.fields[ordinal]
  }
}

impl std::ops::Index<&str> for SchemaDescriptor {
  type Output = SchemaRef;
  fn index(&self, name: &str) -> &SchemaRef {
    assert!(self.is_record(), "schema is not subscriptable by name: not a record");
    let idx = *self
      .field_index
      .get(name)
      .unwrap_or_else(|| panic!("no such field: {}", name));
    &self.fields[idx]
  }
}

/// Promotes metadata collected on a list schema's element onto the list
/// schema itself, then clears it on the element.
///
/// `< // $attr=v // [int] >` should attach `$attr` to the list, not the
/// element — the decoder performs this promotion when popping a list schema
/// off its context stack, and the encoder performs the symmetric step
/// before rendering a list, so both directions agree.
pub fn promote_element_meta(list_schema: &SchemaRef) {
  let element = match list_schema.borrow().element() {
    Some(e) => e,
    None => return,
  };
  let element_meta = element.borrow().meta.clone();
  if !element_meta.is_empty() {
    list_schema.borrow_mut().meta.apply(&element_meta);
    element.borrow_mut().meta.clear();
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn add_field_promotes_any_to_record_and_auto_names() {
    let schema = SchemaDescriptor::any();
    assert!(schema.borrow().is_any());

    schema.borrow_mut().add_field(SchemaDescriptor::primitive("string"));
    schema.borrow_mut().add_field(SchemaDescriptor::primitive("number"));

    let s = schema.borrow();
    assert!(s.is_record());
    assert_eq!(s.field_count(), 2);
    assert_eq!(s.field_at(0).unwrap().borrow().name.as_deref(), Some("0"));
    assert_eq!(s.field_at(1).unwrap().borrow().name.as_deref(), Some("1"));
    assert!(s.field("0").is_some());
    assert!(s.field("1").is_some());
  }

  #[test]
  fn replace_field_preserves_ordinal() {
    let schema = SchemaDescriptor::record();
    schema.borrow_mut().replace_field("a", SchemaDescriptor::any());
    schema.borrow_mut().replace_field("b", SchemaDescriptor::any());
    schema
      .borrow_mut()
      .replace_field("a", SchemaDescriptor::primitive("number"));

    let s = schema.borrow();
    assert_eq!(s.field_count(), 2);
    assert_eq!(s.field_at(0).unwrap().borrow().type_name, "number");
    assert_eq!(s.field_at(1).unwrap().borrow().name.as_deref(), Some("b"));
  }

  #[test]
  fn list_element_meta_promotes_to_list() {
    let element = SchemaDescriptor::primitive("number");
    element.borrow_mut().meta.add_tag("inner");
    let list = SchemaDescriptor::list(element.clone());

    promote_element_meta(&list);

    assert_eq!(list.borrow().meta.tags, vec!["inner".to_string()]);
    assert!(element.borrow().meta.is_empty());
  }

  #[test]
  fn canonical_alias_resolution() {
    assert_eq!(canonical_primitive_name("int"), "number");
    assert_eq!(canonical_primitive_name("float"), "number");
    assert_eq!(canonical_primitive_name("string"), "string");
  }
}
