//! The `decode` module implements the single-pass, cursor-driven decoder:
//! it consumes a text buffer and produces a root node plus capped lists of
//! errors and warnings. See [`decode`] for the entry point.

mod cursor;
mod grammar;

use crate::node::Node;
use crate::schema::SchemaRef;

pub(crate) use cursor::Decoder;

/// The maximum number of errors or warnings a single decode accumulates.
/// Acts as backpressure against pathological inputs: further diagnostics
/// past this cap are silently dropped, bounding memory for diagnostics.
pub const MAX_DIAGNOSTICS: usize = 50;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
  Error,
  Warning,
}

/// The closed set of error/warning message families the decoder raises.
/// Closed so callers can match on kind instead of grepping message text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiagnosticKind {
  ExpectedChar,
  UnexpectedChar,
  UnexpectedEof,
  InvalidNumber,
  UnterminatedComment,
  UnexpectedEofNode,
  UnexpectedEofStringEscape,
  ImplicitAttribute,
  UnknownFlag,
  NoParentForMeta,
}

/// A single diagnostic record: severity, message, and cursor position.
#[derive(Clone, Debug)]
pub struct Diagnostic {
  pub severity: Severity,
  pub kind: DiagnosticKind,
  pub message: String,
  pub line: usize,
  pub column: usize,
  pub offset: usize,
}

/// Options accepted by [`decode`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeOptions {
  /// Strip ANSI CSI escape sequences from the input before parsing.
  pub remove_ansi_colors: bool,
  /// Emit extra `tracing` diagnostics at `debug` level while decoding.
  pub debug: bool,
}

/// The result of a decode: a (possibly partial) root node and schema, plus
/// accumulated diagnostics. `decode` never fails outright — callers read
/// `errors.is_empty()` as success.
pub struct DecodeResult {
  pub node: Node,
  pub schema: SchemaRef,
  pub errors: Vec<Diagnostic>,
  pub warnings: Vec<Diagnostic>,
}

/// Decodes `text` into a schema-linked document tree.
///
/// `schema_prefix`, when given, is concatenated in front of `text` before
/// parsing — the externally-provided schema-only prefix mentioned in the
/// decoder's input contract, useful for applying a schema to data that
/// doesn't carry its own header.
pub fn decode(
  text: &str,
  options: DecodeOptions,
  schema_prefix: Option<&str>,
) -> DecodeResult {
  let stripped;
  let input: &str = if options.remove_ansi_colors {
    stripped = crate::ansi::strip(text);
    &stripped
  } else {
    text
  };

  let combined;
  let full_input: &str = match schema_prefix {
    Some(prefix) if !prefix.is_empty() => {
      combined = format!("{}{}", prefix, input);
      &combined
    }
    _ => input,
  };

  let span = tracing::debug_span!("akd_decode", bytes = full_input.len());
  let _enter = span.enter();
  if options.debug {
    tracing::debug!(bytes = full_input.len(), "decoding akd document");
  }

  let mut decoder = Decoder::new(full_input);
  let (schema, node) = decoder.parse_document();

  for warning in &decoder.warnings {
    tracing::warn!(message = %warning.message, line = warning.line, column = warning.column, "akd decode warning");
  }

  DecodeResult {
    node,
    schema,
    errors: decoder.errors,
    warnings: decoder.warnings,
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn decode_never_panics_on_truncated_input() {
    for input in ["[1, 2, 3", "(1, ?)", "\"\\"] {
      let result = decode(input, DecodeOptions::default(), None);
      assert!(!result.errors.is_empty(), "expected at least one error for {:?}", input);
    }
  }

  #[test]
  fn error_cap_is_fifty() {
    let bad = "?".repeat(100);
    let result = decode(&bad, DecodeOptions::default(), None);
    assert_eq!(result.errors.len(), MAX_DIAGNOSTICS);
  }
}
