// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Strict JSON extraction tier
//!
//! The happy path: the model did what the prompt asked and emitted a JSON
//! array, possibly padded with prose or markdown fences.

use chrono::{DateTime, Utc};

use super::Record;

/// Extract and parse a JSON array from the text.
///
/// Returns `None` when no bracketed slice exists or the slice is not valid
/// JSON, handing control to the table tier. A successfully parsed array,
/// including an empty one, is final; malformed elements are dropped.
pub(super) fn parse<R: Record>(text: &str, fallback: DateTime<Utc>) -> Option<Vec<R>> {
    let slice = bracketed_slice(text)?;
    let cleaned = slice.replace("```json", "").replace("```", "");

    let value: serde_json::Value = serde_json::from_str(cleaned.trim()).ok()?;
    let array = value.as_array()?;

    Some(array.iter().filter_map(|v| R::from_json(v, fallback)).collect())
}

/// Slice from the first `[` to the last `]`, inclusive
fn bracketed_slice(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
