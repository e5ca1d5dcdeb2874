//! Small shared helpers that don't deserve their own module.

/// An insertion-ordered string-keyed map.
///
/// Lookups are linear, which is fine here: attribute maps and field lists in
/// AKD documents are small (a handful of entries), and the ordering
/// guarantee is the entire point — a `HashMap` would silently reorder
/// `$key=value` pairs on every encode.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderedMap<V> {
  entries: Vec<(String, V)>,
}

impl<V> Default for OrderedMap<V> {
  fn default() -> Self {
    OrderedMap { entries: Vec::new() }
  }
}

impl<V> OrderedMap<V> {
  pub fn new() -> Self {
    OrderedMap { entries: Vec::new() }
  }

  /// Inserts or overwrites `key`, preserving the original position on
  /// overwrite and appending on first insertion.
  pub fn insert(&mut self, key: impl Into<String>, value: V) {
    let key = key.into();
    match self.entries.iter_mut().find(|(k, _)| *k == key) {
      Some((_, v)) => *v = value,
      None => self.entries.push((key, value)),
    }
  }

  pub fn get(&self, key: &str) -> Option<&V> {
    self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }

  /// Appends every entry of `other`, overwriting keys already present while
  /// keeping their original ordinal position.
  pub fn extend_from(&mut self, other: &OrderedMap<V>)
  where
    V: Clone,
  {
    for (k, v) in other.iter() {
      self.insert(k, v.clone());
    }
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }
}
