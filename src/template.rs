//! Splitting code templates into literal code and `%SLOT-n%` placeholders.
//!
//! The front-end renders `Code` segments verbatim and binds each `Slot`
//! segment to the slot with the same id (`%SLOT-3%` -> `slot-3`).

use serde::Serialize;

const TOKEN_OPEN: &str = "%SLOT-";
const TOKEN_CLOSE: char = '%';

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
  Code { text: String },
  Slot { slot_id: String },
}

/// Slot id referenced by a placeholder number.
pub fn slot_id_for(number: &str) -> String {
  format!("slot-{}", number)
}

/// Split a template into segments. Malformed tokens (no digits, no closing `%`)
/// stay part of the surrounding code.
pub fn segments(template: &str) -> Vec<Segment> {
  let mut out = Vec::new();
  let mut code = String::new();
  let mut rest = template;

  while let Some(start) = rest.find(TOKEN_OPEN) {
    let after = &rest[start + TOKEN_OPEN.len()..];
    let digits = after.find(|c: char| !c.is_ascii_digit()).unwrap_or(after.len());
    let closed = digits > 0 && after[digits..].starts_with(TOKEN_CLOSE);

    if closed {
      code.push_str(&rest[..start]);
      if !code.is_empty() {
        out.push(Segment::Code { text: std::mem::take(&mut code) });
      }
      out.push(Segment::Slot { slot_id: slot_id_for(&after[..digits]) });
      rest = &after[digits + TOKEN_CLOSE.len_utf8()..];
    } else {
      // Keep the '%' and continue scanning after it.
      code.push_str(&rest[..start + 1]);
      rest = &rest[start + 1..];
    }
  }

  code.push_str(rest);
  if !code.is_empty() {
    out.push(Segment::Code { text: code });
  }
  out
}

/// Slot ids referenced by a template, in order of appearance.
pub fn slot_ids(template: &str) -> Vec<String> {
  segments(template)
    .into_iter()
    .filter_map(|s| match s {
      Segment::Slot { slot_id } => Some(slot_id),
      Segment::Code { .. } => None,
    })
    .collect()
}
