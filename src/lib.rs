//! Arkadia Data (AKD) is a schema-first, token-efficient textual format for
//! passing structured data to and from language models. A document is a
//! schema header (inline `<...>` or a nominal `@Name<...>` definition,
//! optionally just a reference to a schema defined earlier) followed by
//! exactly one data value whose shape that schema describes.
//!
//! The three public entry points:
//!
//! - [`decode::decode`] parses AKD text into a schema-linked [`node::Node`]
//!   tree, accumulating diagnostics rather than failing outright.
//! - [`encode::encode`] renders a node tree back to AKD text.
//! - [`builder::parse`] builds a node tree directly from a
//!   `serde_json::Value`, bypassing the text format entirely.

mod ansi;
pub mod builder;
pub mod decode;
pub mod encode;
mod meta;
pub mod node;
pub mod schema;
mod util;

pub use builder::{parse, NodeError};
pub use decode::{decode, DecodeOptions, DecodeResult, Diagnostic, DiagnosticKind, Severity};
pub use encode::{encode, Config, EncodeInput};
pub use node::Node;
pub use schema::{SchemaDescriptor, SchemaRef};

#[cfg(test)]
mod integration_test {
  use super::*;

  #[test]
  fn decode_then_encode_round_trips_a_simple_record() {
    let result = decode("<x:number,y:number>(10,20)", DecodeOptions::default(), None);
    assert!(result.errors.is_empty());
    let text = encode(&result.node, &Config::default());
    let reparsed = decode(&text, DecodeOptions::default(), None);
    assert!(reparsed.errors.is_empty());
    assert_eq!(reparsed.node.to_json(), result.node.to_json());
  }

  #[test]
  fn parse_then_encode_produces_decodable_text() {
    let value = serde_json::json!({"name": "Ada", "tags": ["math", "computing"]});
    let node = parse(&value).unwrap();
    let text = encode(&node, &Config::default());
    let result = decode(&text, DecodeOptions::default(), None);
    assert!(result.errors.is_empty());
    assert_eq!(result.node.to_json(), value);
  }
}
