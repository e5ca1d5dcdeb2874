//! Cursor state, character-level primitives, and metadata-block parsing.
//! Grammar-level parsing (schemas, data values) lives in `grammar.rs`.

use super::{Diagnostic, DiagnosticKind, Severity, MAX_DIAGNOSTICS};
use crate::meta::{AttrValue, Meta};
use crate::schema::SchemaRef;
use std::collections::HashMap;

pub(crate) fn is_ident_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_ident_continue(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_'
}

/// The decoder's cursor: owns the character buffer, tracks position for
/// diagnostics, and accumulates metadata between tokens until something
/// claims it.
pub(crate) struct Decoder {
  chars: Vec<char>,
  pos: usize,
  line: usize,
  column: usize,
  pub(crate) registry: HashMap<String, SchemaRef>,
  pending_meta: Meta,
  pub(crate) errors: Vec<Diagnostic>,
  pub(crate) warnings: Vec<Diagnostic>,
}

impl Decoder {
  pub(crate) fn new(text: &str) -> Self {
    Decoder {
      chars: text.chars().collect(),
      pos: 0,
      line: 1,
      column: 1,
      registry: HashMap::new(),
      pending_meta: Meta::new(),
      errors: Vec::new(),
      warnings: Vec::new(),
    }
  }

  pub(crate) fn eof(&self) -> bool {
    self.pos >= self.chars.len()
  }

  pub(crate) fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  pub(crate) fn peek_at(&self, offset: usize) -> Option<char> {
    self.chars.get(self.pos + offset).copied()
  }

  pub(crate) fn advance(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.pos += 1;
    if c == '\n' {
      self.line += 1;
      self.column = 1;
    } else {
      self.column += 1;
    }
    Some(c)
  }

  fn skip_plain_whitespace(&mut self) {
    while let Some(c) = self.peek() {
      if c.is_whitespace() {
        self.advance();
      } else {
        break;
      }
    }
  }

  pub(crate) fn push_error(&mut self, kind: DiagnosticKind, message: String) {
    tracing::trace!(%message, line = self.line, column = self.column, "akd decode error");
    if self.errors.len() < MAX_DIAGNOSTICS {
      self.errors.push(Diagnostic {
        severity: Severity::Error,
        kind,
        message,
        line: self.line,
        column: self.column,
        offset: self.pos,
      });
    }
  }

  pub(crate) fn push_warning(&mut self, kind: DiagnosticKind, message: String) {
    if self.warnings.len() < MAX_DIAGNOSTICS {
      self.warnings.push(Diagnostic {
        severity: Severity::Warning,
        kind,
        message,
        line: self.line,
        column: self.column,
        offset: self.pos,
      });
    }
  }

  pub(crate) fn take_pending_meta(&mut self) -> Meta {
    std::mem::take(&mut self.pending_meta)
  }

  pub(crate) fn expect_char(&mut self, expected: char) {
    if self.peek() == Some(expected) {
      self.advance();
    } else {
      let got = self.peek().map(|c| c.to_string()).unwrap_or_else(|| "end of input".to_string());
      self.push_error(
        DiagnosticKind::ExpectedChar,
        format!("Expected '{}', found {}", expected, got),
      );
    }
  }

  /// Reads an identifier: a backtick-escaped run of arbitrary characters, or
  /// a plain `[A-Za-z_][A-Za-z0-9_]*` run. Returns an empty string (and
  /// leaves the cursor untouched) if neither form starts here.
  pub(crate) fn read_identifier(&mut self) -> String {
    if self.peek() == Some('`') {
      self.advance();
      let mut s = String::new();
      loop {
        match self.peek() {
          None => {
            self.push_error(
              DiagnosticKind::UnexpectedEof,
              "Unexpected EOF: backtick identifier not closed".to_string(),
            );
            break;
          }
          Some('`') => {
            self.advance();
            break;
          }
          Some(c) => {
            self.advance();
            s.push(c);
          }
        }
      }
      s
    } else {
      let mut s = String::new();
      while let Some(c) = self.peek() {
        let ok = if s.is_empty() { is_ident_start(c) } else { is_ident_continue(c) };
        if ok {
          s.push(c);
          self.advance();
        } else {
          break;
        }
      }
      s
    }
  }

  /// Reads a double-quoted string, resolving `\n \t \r \" \\` escapes;
  /// any other escaped character is taken literally.
  pub(crate) fn read_quoted_string(&mut self) -> String {
    self.advance(); // opening quote
    let mut s = String::new();
    loop {
      match self.peek() {
        None => {
          self.push_error(
            DiagnosticKind::UnexpectedEof,
            "Unexpected EOF: string not closed".to_string(),
          );
          break;
        }
        Some('"') => {
          self.advance();
          break;
        }
        Some('\\') => {
          self.advance();
          match self.peek() {
            None => {
              self.push_error(
                DiagnosticKind::UnexpectedEofStringEscape,
                "Unexpected EOF inside string escape".to_string(),
              );
              break;
            }
            Some('n') => {
              s.push('\n');
              self.advance();
            }
            Some('t') => {
              s.push('\t');
              self.advance();
            }
            Some('r') => {
              s.push('\r');
              self.advance();
            }
            Some(c) => {
              s.push(c);
              self.advance();
            }
          }
        }
        Some(c) => {
          s.push(c);
          self.advance();
        }
      }
    }
    s
  }

  /// Reads a number literal: optional leading `-`, digits, optional
  /// fractional part, optional exponent. Invalid text is reported and
  /// `0.0` is returned so parsing can continue.
  pub(crate) fn read_number(&mut self) -> f64 {
    let mut text = String::new();
    if self.peek() == Some('-') {
      text.push('-');
      self.advance();
    }
    while let Some(c) = self.peek() {
      if c.is_ascii_digit() {
        text.push(c);
        self.advance();
      } else {
        break;
      }
    }
    if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
      text.push('.');
      self.advance();
      while let Some(c) = self.peek() {
        if c.is_ascii_digit() {
          text.push(c);
          self.advance();
        } else {
          break;
        }
      }
    }
    if matches!(self.peek(), Some('e') | Some('E')) {
      let sign_offset = if matches!(self.peek_at(1), Some('+') | Some('-')) { 1 } else { 0 };
      if self.peek_at(1 + sign_offset).is_some_and(|c| c.is_ascii_digit()) {
        text.push(self.advance().unwrap());
        if sign_offset == 1 {
          text.push(self.advance().unwrap());
        }
        while let Some(c) = self.peek() {
          if c.is_ascii_digit() {
            text.push(c);
            self.advance();
          } else {
            break;
          }
        }
      }
    }
    match text.parse::<f64>() {
      Ok(v) => v,
      Err(_) => {
        self.push_error(DiagnosticKind::InvalidNumber, format!("Invalid number format: '{}'", text));
        0.0
      }
    }
  }

  fn read_attr_value(&mut self) -> AttrValue {
    match self.peek() {
      Some('"') => AttrValue::Str(self.read_quoted_string()),
      Some(c) if c == '-' || c.is_ascii_digit() => AttrValue::Number(self.read_number()),
      _ => {
        let word = self.read_identifier();
        match word.as_str() {
          "true" => AttrValue::Bool(true),
          "false" => AttrValue::Bool(false),
          "null" => AttrValue::Null,
          _ => AttrValue::Str(word),
        }
      }
    }
  }

  fn finish_attribute(&mut self, name: String) {
    self.skip_plain_whitespace();
    if self.peek() == Some('=') {
      self.advance();
      self.skip_plain_whitespace();
      let value = self.read_attr_value();
      self.pending_meta.set_attribute(name, value);
    } else {
      self.pending_meta.set_attribute(name, AttrValue::Bool(true));
    }
  }

  /// Reads a nested `/* ... */` block comment body (the opening `/*` must
  /// already be consumed by the caller), honoring `\`-escaping so a literal
  /// `*/` can appear inside a comment, and nesting depth so inner `/* */`
  /// pairs don't close the outer one early.
  fn parse_block_comment(&mut self) {
    let mut depth = 1;
    let mut content = String::new();
    loop {
      match self.peek() {
        None => {
          self.push_error(DiagnosticKind::UnterminatedComment, "Unterminated comment".to_string());
          break;
        }
        Some('\\') => {
          self.advance();
          if let Some(c) = self.advance() {
            content.push(c);
          }
        }
        Some('/') if self.peek_at(1) == Some('*') => {
          self.advance();
          self.advance();
          depth += 1;
          content.push_str("/*");
        }
        Some('*') if self.peek_at(1) == Some('/') => {
          self.advance();
          self.advance();
          depth -= 1;
          if depth == 0 {
            break;
          }
          content.push_str("*/");
        }
        Some(c) => {
          self.advance();
          content.push(c);
        }
      }
    }
    self.pending_meta.add_comment(content.trim().to_string());
  }

  fn matches_closing(&self, closing: &str) -> bool {
    closing.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
  }

  fn consume_closing(&mut self, closing: &str) {
    for _ in 0..closing.chars().count() {
      self.advance();
    }
  }

  /// Parses the contents of a metadata block up to (and consuming) its
  /// closing delimiter: attributes (`$name[=value]`), tags (`#name`), flags
  /// (`!name`), nested block comments, and bare implicit attributes
  /// (`name[=value]` without the leading `$`, which warns).
  fn parse_meta_contents(&mut self, closing: &str) {
    loop {
      self.skip_plain_whitespace();
      if self.eof() {
        self.push_error(
          DiagnosticKind::UnexpectedEof,
          "Unexpected EOF: metadata block not closed".to_string(),
        );
        return;
      }
      if self.matches_closing(closing) {
        self.consume_closing(closing);
        return;
      }
      match self.peek().unwrap() {
        '/' if self.peek_at(1) == Some('*') => {
          self.advance();
          self.advance();
          self.parse_block_comment();
        }
        '$' => {
          self.advance();
          let name = self.read_identifier();
          self.finish_attribute(name);
        }
        '#' => {
          self.advance();
          let name = self.read_identifier();
          self.pending_meta.add_tag(name);
        }
        '!' => {
          self.advance();
          let name = self.read_identifier();
          if name == "required" {
            self.pending_meta.required = true;
          } else {
            self.push_warning(DiagnosticKind::UnknownFlag, format!("Unknown flag: !{}", name));
          }
        }
        c if is_ident_start(c) || c == '`' => {
          let name = self.read_identifier();
          self.push_warning(
            DiagnosticKind::ImplicitAttribute,
            format!("Implicit attribute '{}'. Use '${}' instead.", name, name),
          );
          self.finish_attribute(name);
        }
        c => {
          self.push_error(DiagnosticKind::UnexpectedChar, format!("Unexpected character '{}'", c));
          self.advance();
        }
      }
    }
  }

  /// Drains whitespace, block comments, wrapped metadata blocks
  /// (`//...//`, and the older single-`/...` /` form), and stray inline
  /// `$attr`/`#tag`/`!flag` modifiers into `pending_meta`.
  pub(crate) fn skip_ws_and_meta(&mut self) {
    loop {
      match self.peek() {
        Some(c) if c.is_whitespace() => {
          self.advance();
        }
        Some('/') if self.peek_at(1) == Some('*') => {
          self.advance();
          self.advance();
          self.parse_block_comment();
        }
        Some('/') if self.peek_at(1) == Some('/') => {
          self.advance();
          self.advance();
          self.parse_meta_contents("//");
        }
        Some('/') => {
          self.advance();
          self.parse_meta_contents("/");
        }
        Some('$') => {
          self.advance();
          let name = self.read_identifier();
          self.finish_attribute(name);
        }
        Some('#') => {
          self.advance();
          let name = self.read_identifier();
          self.pending_meta.add_tag(name);
        }
        Some('!') => {
          self.advance();
          let name = self.read_identifier();
          if name == "required" {
            self.pending_meta.required = true;
          } else {
            self.push_warning(DiagnosticKind::UnknownFlag, format!("Unknown flag: !{}", name));
          }
        }
        _ => break,
      }
    }
  }
}
