//! The `meta` module implements the metadata container shared by schema
//! descriptors and document nodes: comments, `$key=value` attributes,
//! `#tags`, and the `required` flag.
//!
//! Metadata is syntactically first-class but semantically transparent —
//! nothing in [`crate::schema`] or [`crate::node`] branches on metadata
//! content, only on its presence or absence.

use crate::util::OrderedMap;
use std::fmt::Write as _;

/// A scalar attribute value. Mirrors the primitive union accepted by
/// `$name=value` attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
  Str(String),
  Number(f64),
  Bool(bool),
  Null,
}

impl AttrValue {
  /// Renders the value the way it appears after `$key=`.
  ///
  /// Strings are quoted; everything else renders bare. A boolean `true` is
  /// the implicit value of a flag-style attribute (`$k` with no `=value`),
  /// so it's handled specially by the caller, not here.
  pub fn render(&self) -> String {
    match self {
      AttrValue::Str(s) => format!("{:?}", s),
      AttrValue::Number(n) => {
        if n.fract() == 0.0 && n.abs() < 1e15 {
          format!("{}", *n as i64)
        } else {
          format!("{}", n)
        }
      }
      AttrValue::Bool(b) => b.to_string(),
      AttrValue::Null => "null".to_string(),
    }
  }
}

/// Metadata carried by both [`crate::schema::SchemaDescriptor`] and
/// [`crate::node::Node`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Meta {
  pub comments: Vec<String>,
  pub attributes: OrderedMap<AttrValue>,
  pub tags: Vec<String>,
  pub required: bool,
}

impl Meta {
  pub fn new() -> Self {
    Meta::default()
  }

  pub fn is_empty(&self) -> bool {
    self.comments.is_empty()
      && self.attributes.is_empty()
      && self.tags.is_empty()
      && !self.required
  }

  pub fn add_comment(&mut self, comment: impl Into<String>) {
    self.comments.push(comment.into());
  }

  pub fn set_attribute(&mut self, name: impl Into<String>, value: AttrValue) {
    self.attributes.insert(name, value);
  }

  pub fn add_tag(&mut self, tag: impl Into<String>) {
    self.tags.push(tag.into());
  }

  /// Merges `other` into `self`: comments append, attributes overwrite by
  /// key (preserving original ordinal position), tags append, `required` is
  /// OR-combined. This is the one merge rule every caller relies on — see
  /// the list-element metadata promotion in [`crate::schema`].
  pub fn apply(&mut self, other: &Meta) {
    self.comments.extend(other.comments.iter().cloned());
    self.attributes.extend_from(&other.attributes);
    self.tags.extend(other.tags.iter().cloned());
    self.required = self.required || other.required;
  }

  pub fn clear(&mut self) {
    self.comments.clear();
    self.attributes.clear();
    self.tags.clear();
    self.required = false;
  }

  /// A short, single-line debug summary: `!required`, then `#tag` entries,
  /// then `$key=value` entries (string values quoted), then a truncated
  /// comment preview.
  pub fn debug_summary(&self) -> String {
    let mut out = String::new();
    if self.required {
      out.push_str("!required ");
    }
    for tag in &self.tags {
      let _ = write!(out, "#{} ", tag);
    }
    for (key, value) in self.attributes.iter() {
      let _ = write!(out, "${}={} ", key, value.render());
    }
    match self.comments.len() {
      0 => {}
      1 => {
        let c = &self.comments[0];
        let preview: String = c.chars().take(20).collect();
        if preview.len() < c.len() {
          let _ = write!(out, "/* {}... */", preview);
        } else {
          let _ = write!(out, "/* {} */", preview);
        }
      }
      n => {
        let _ = write!(out, "/* {} comments */", n);
      }
    }
    out.trim_end().to_string()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn apply_merges_additively() {
    let mut a = Meta::new();
    a.add_comment("first");
    a.set_attribute("x", AttrValue::Number(1.0));
    a.add_tag("alpha");

    let mut b = Meta::new();
    b.add_comment("second");
    b.set_attribute("x", AttrValue::Number(2.0));
    b.set_attribute("y", AttrValue::Bool(true));
    b.add_tag("beta");
    b.required = true;

    a.apply(&b);

    assert_eq!(a.comments, vec!["first", "second"]);
    assert_eq!(a.attributes.get("x"), Some(&AttrValue::Number(2.0)));
    assert_eq!(a.attributes.get("y"), Some(&AttrValue::Bool(true)));
    assert_eq!(a.tags, vec!["alpha", "beta"]);
    assert!(a.required);
  }

  #[test]
  fn debug_summary_orders_required_tags_attrs_comments() {
    let mut m = Meta::new();
    m.required = true;
    m.add_tag("important");
    m.set_attribute("size", AttrValue::Number(3.0));
    m.add_comment("a note");
    assert_eq!(
      m.debug_summary(),
      "!required #important $size=3 /* a note */"
    );
  }
}
