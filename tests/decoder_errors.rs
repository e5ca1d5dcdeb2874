//! Error-detection behavior exercised from the public API: every
//! malformed input below must surface at least one positioned diagnostic,
//! and the decoder must never panic doing it.

use akd::{decode, DecodeOptions};

#[test]
fn truncated_list_reports_a_positioned_error() {
  let result = decode("[1, 2, 3", DecodeOptions::default(), None);
  assert!(!result.errors.is_empty());
  let first = &result.errors[0];
  assert!(first.line >= 1);
  assert!(first.offset <= "[1, 2, 3".len());
}

#[test]
fn bad_record_separator_reports_an_error() {
  let result = decode("(1, ?)", DecodeOptions::default(), None);
  assert!(!result.errors.is_empty());
}

#[test]
fn unterminated_string_escape_reports_an_error() {
  let result = decode("\"\\", DecodeOptions::default(), None);
  assert!(!result.errors.is_empty());
}

#[test]
fn raw_ansi_escapes_are_errors_unless_stripped() {
  let input = "\u{1b}[31m<x:number>(1)\u{1b}[0m";

  let left_raw = decode(input, DecodeOptions::default(), None);
  assert!(!left_raw.errors.is_empty(), "expected raw escape bytes to confuse the parser");

  let stripped = decode(
    input,
    DecodeOptions { remove_ansi_colors: true, ..DecodeOptions::default() },
    None,
  );
  assert!(stripped.errors.is_empty(), "stripping ANSI colors should leave valid AKD text");
  assert_eq!(stripped.node.field("x").unwrap().value().unwrap(), &akd::node::Scalar::Number(1.0));
}

#[test]
fn one_hundred_bad_tokens_caps_at_fifty_errors() {
  let bad = "?".repeat(100);
  let result = decode(&bad, DecodeOptions::default(), None);
  assert_eq!(result.errors.len(), 50);
}

#[test]
fn decoding_never_panics_on_adversarial_inputs() {
  let inputs = [
    "",
    "@",
    "<",
    "[[[[[",
    "{{{{{",
    "@Name<x:",
    "\"unterminated",
    "/* unterminated comment",
    "//unterminated meta",
    "<x:number,>(1,)",
  ];
  for input in inputs {
    let _ = decode(input, DecodeOptions::default(), None);
  }
}
