// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Normalization of model output into typed records
//!
//! The vision model is asked for a JSON array but replies however it likes:
//! bare arrays, arrays buried in prose, fenced markdown, or pipe tables.
//! Parsing is attempted in order (strict JSON extraction, then the table
//! fallback) and the first tier that succeeds wins. Normalization is total:
//! any input, including garbage, yields a (possibly empty) record list.

pub mod json;
pub mod table;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A grocery item detected in an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub item_name: String,
    pub count: u32,
    pub timestamp: DateTime<Utc>,
}

/// A produce item with a freshness assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceItem {
    pub produce: String,
    pub freshness: String,
    pub expected_lifespan: String,
    pub timestamp: DateTime<Utc>,
}

/// Display severity derived from the remaining shelf life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessBucket {
    Critical,
    Warning,
    Good,
}

impl FreshnessBucket {
    pub fn from_days(days: u32) -> Self {
        if days <= 1 {
            Self::Critical
        } else if days <= 3 {
            Self::Warning
        } else {
            Self::Good
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Good => "good",
        }
    }
}

impl ProduceItem {
    /// Remaining shelf life in days: first run of digits in the lifespan
    /// text; absent or unparsable reads as 0 (the most severe bucket).
    pub fn lifespan_days(&self) -> u32 {
        first_int(&self.expected_lifespan).unwrap_or(0)
    }

    pub fn bucket(&self) -> FreshnessBucket {
        FreshnessBucket::from_days(self.lifespan_days())
    }
}

/// Filter for filler rows the model emits in table renderings, e.g.
/// "packaged goods" lines it cannot individually assess. The vocabulary is
/// tuned to observed model output and extensible through the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowFilter {
    /// Names skipped on exact match
    #[serde(default = "default_names")]
    pub names: Vec<String>,
    /// Names skipped when they contain one of these (case-insensitive)
    #[serde(default = "default_substrings")]
    pub substrings: Vec<String>,
}

fn default_names() -> Vec<String> {
    vec!["N/A".to_string(), "-".to_string()]
}

fn default_substrings() -> Vec<String> {
    vec!["packaged".to_string()]
}

impl Default for RowFilter {
    fn default() -> Self {
        Self {
            names: default_names(),
            substrings: default_substrings(),
        }
    }
}

impl RowFilter {
    pub fn is_filler(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.names.iter().any(|n| n == name)
            || self.substrings.iter().any(|s| lower.contains(&s.to_lowercase()))
    }
}

/// Record shapes the normalizer can target
pub trait Record: Sized {
    /// Phrases that mark a table header line for this kind
    const TABLE_MARKERS: &'static [&'static str];

    /// Map one JSON object to a record; `None` drops a malformed object
    fn from_json(value: &serde_json::Value, fallback: DateTime<Utc>) -> Option<Self>;

    /// Map one table row (trimmed, non-empty columns) to a record
    fn from_row(cols: &[&str], filter: &RowFilter, timestamp: DateTime<Utc>) -> Option<Self>;
}

impl Record for InventoryItem {
    const TABLE_MARKERS: &'static [&'static str] = &["Item Name", "Count", "Freshness"];

    fn from_json(value: &serde_json::Value, fallback: DateTime<Utc>) -> Option<Self> {
        let obj = value.as_object()?;
        let item_name = nonempty_str(obj.get("itemName")?)?;
        let count = obj.get("count").map(json_count).unwrap_or(1);
        let timestamp = parse_timestamp(obj.get("timestamp")).unwrap_or(fallback);

        Some(Self { item_name, count, timestamp })
    }

    fn from_row(cols: &[&str], _filter: &RowFilter, timestamp: DateTime<Utc>) -> Option<Self> {
        if cols.len() < 2 {
            return None;
        }
        Some(Self {
            item_name: cols[0].to_string(),
            count: leading_int(cols[1]).unwrap_or(1),
            timestamp,
        })
    }
}

impl Record for ProduceItem {
    const TABLE_MARKERS: &'static [&'static str] =
        &["Produce", "Freshness", "Expected Life", "Lifespan"];

    fn from_json(value: &serde_json::Value, fallback: DateTime<Utc>) -> Option<Self> {
        let obj = value.as_object()?;
        let produce = nonempty_str(obj.get("produce")?)?;
        let freshness = opt_str(obj.get("freshness"));
        let expected_lifespan = opt_str(obj.get("expectedLifespan"));
        let timestamp = parse_timestamp(obj.get("timestamp")).unwrap_or(fallback);

        Some(Self { produce, freshness, expected_lifespan, timestamp })
    }

    fn from_row(cols: &[&str], filter: &RowFilter, timestamp: DateTime<Utc>) -> Option<Self> {
        if cols.len() < 3 || filter.is_filler(cols[0]) {
            return None;
        }
        Some(Self {
            produce: cols[0].to_string(),
            freshness: cols[1].to_string(),
            expected_lifespan: cols[2].to_string(),
            timestamp,
        })
    }
}

/// Convert raw model output into records of the requested kind.
///
/// Never fails: output order follows the source text, and input with no
/// recognizable structure yields an empty vector. All rows produced by one
/// call share a single timestamp so a detection pass sorts together.
pub fn normalize<R: Record>(text: &str, filter: &RowFilter) -> Vec<R> {
    let now = Utc::now();

    if let Some(records) = json::parse(text, now) {
        return records;
    }
    table::parse(text, filter, now)
}

// === Field parsing helpers ===

fn nonempty_str(value: &serde_json::Value) -> Option<String> {
    let s = value.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn opt_str(value: Option<&serde_json::Value>) -> String {
    value
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn parse_timestamp(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    let s = value?.as_str()?;
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Count from a JSON value: positive integers pass through, numeric strings
/// are parsed, anything else defaults to 1
fn json_count(value: &serde_json::Value) -> u32 {
    if let Some(n) = value.as_u64() {
        if n >= 1 {
            return n.min(u32::MAX as u64) as u32;
        }
        return 1;
    }
    if let Some(s) = value.as_str() {
        return leading_int(s).unwrap_or(1);
    }
    1
}

/// Integer from the leading digit run of a trimmed string ("3 bottles" → 3)
pub(crate) fn leading_int(s: &str) -> Option<u32> {
    let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// First digit run anywhere in the string ("about 5 days" → 5)
pub(crate) fn first_int(s: &str) -> Option<u32> {
    let digits: String = s
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> RowFilter {
        RowFilter::default()
    }

    #[test]
    fn test_json_round_trip() {
        let text = r#"[
            {"itemName": "Red Apple", "count": 3, "timestamp": "2025-06-01T10:00:00Z"},
            {"itemName": "Milk Carton", "count": 1, "timestamp": "2025-06-01T10:00:00Z"}
        ]"#;
        let items: Vec<InventoryItem> = normalize(text, &filter());

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_name, "Red Apple");
        assert_eq!(items[0].count, 3);
        assert_eq!(items[0].timestamp.to_rfc3339(), "2025-06-01T10:00:00+00:00");
        assert_eq!(items[1].item_name, "Milk Carton");
    }

    #[test]
    fn test_empty_json_array_is_empty_not_fallback() {
        // An empty array is a valid answer; the table tier must not run even
        // though the text below it contains a recognizable header line.
        let text = "[]\n| Item Name | Count |\n| Banana | 3 |";
        let items: Vec<InventoryItem> = normalize(text, &filter());
        assert!(items.is_empty());
    }

    #[test]
    fn test_markdown_fences_are_stripped() {
        let fenced = "```json\n[{\"itemName\":\"Apple\",\"count\":2}]\n```";
        let bare = "[{\"itemName\":\"Apple\",\"count\":2}]";

        let a: Vec<InventoryItem> = normalize(fenced, &filter());
        let b: Vec<InventoryItem> = normalize(bare, &filter());

        assert_eq!(a.len(), 1);
        assert_eq!(a[0].item_name, b[0].item_name);
        assert_eq!(a[0].count, b[0].count);
    }

    #[test]
    fn test_json_wrapped_in_prose() {
        let text = "Here is what I found:\n[{\"itemName\":\"Bread\",\"count\":1}]\nHope that helps!";
        let items: Vec<InventoryItem> = normalize(text, &filter());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_name, "Bread");
    }

    #[test]
    fn test_missing_timestamp_is_generated() {
        let before = Utc::now();
        let items: Vec<InventoryItem> =
            normalize(r#"[{"itemName":"Eggs","count":12}]"#, &filter());
        let after = Utc::now();

        assert_eq!(items.len(), 1);
        assert!(items[0].timestamp >= before && items[0].timestamp <= after);
    }

    #[test]
    fn test_malformed_objects_are_dropped() {
        let text = r#"[
            {"itemName": "Apple", "count": 1},
            {"count": 5},
            {"itemName": "", "count": 2},
            "not an object",
            {"itemName": "Pear"}
        ]"#;
        let items: Vec<InventoryItem> = normalize(text, &filter());

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_name, "Apple");
        assert_eq!(items[1].item_name, "Pear");
        assert_eq!(items[1].count, 1);
    }

    #[test]
    fn test_count_defaults() {
        let items: Vec<InventoryItem> = normalize(
            r#"[{"itemName":"A","count":"abc"},{"itemName":"B","count":0},{"itemName":"C","count":"4 packs"}]"#,
            &filter(),
        );
        assert_eq!(items[0].count, 1);
        assert_eq!(items[1].count, 1);
        assert_eq!(items[2].count, 4);
    }

    #[test]
    fn test_inventory_table_fallback() {
        let text = "Here is the inventory:\n\
                    | Item Name | Count |\n\
                    | Banana | 3 |\n\
                    | Orange Juice | 1 |";
        let items: Vec<InventoryItem> = normalize(text, &filter());

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_name, "Banana");
        assert_eq!(items[0].count, 3);
        assert_eq!(items[1].item_name, "Orange Juice");
        assert_eq!(items[1].count, 1);
    }

    #[test]
    fn test_table_rows_share_one_timestamp() {
        let text = "| Item Name | Count |\n| Banana | 3 |\n| Apple | 2 |";
        let items: Vec<InventoryItem> = normalize(text, &filter());
        assert_eq!(items[0].timestamp, items[1].timestamp);
    }

    #[test]
    fn test_produce_table_skips_filler_rows() {
        let text = "| Produce | Freshness | Expected Life |\n\
                    | N/A | - | - |\n\
                    | Packaged Pasta | unknown | 30 days |\n\
                    | Gala Apple | Firm and bright | 5 days |";
        let produce: Vec<ProduceItem> = normalize(text, &filter());

        assert_eq!(produce.len(), 1);
        assert_eq!(produce[0].produce, "Gala Apple");
        assert_eq!(produce[0].expected_lifespan, "5 days");
    }

    #[test]
    fn test_prose_without_structure_is_empty() {
        let text = "I could not find any groceries in this image. It appears to show a cat.";
        let items: Vec<InventoryItem> = normalize(text, &filter());
        let produce: Vec<ProduceItem> = normalize(text, &filter());
        assert!(items.is_empty());
        assert!(produce.is_empty());
    }

    #[test]
    fn test_never_fails_on_garbage() {
        for text in [
            "",
            "[",
            "]",
            "][",
            "[{]",
            "[1, 2, 3",
            "| Count |",
            "```json\n```",
            "\u{0} \u{FFFD} [ \" ]",
        ] {
            let _: Vec<InventoryItem> = normalize(text, &filter());
            let _: Vec<ProduceItem> = normalize(text, &filter());
        }
    }

    #[test]
    fn test_unbalanced_brackets_fall_through_to_table() {
        let text = "[ unbalanced\n| Item Name | Count |\n| Banana | 3 |\n]";
        let items: Vec<InventoryItem> = normalize(text, &filter());
        // JSON parse fails, table tier picks up the rows
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_name, "Banana");
    }

    #[test]
    fn test_produce_json_round_trip() {
        let text = r#"[{"produce":"Roma Tomato","freshness":"Slightly soft, deep red","expectedLifespan":"2-3 days"}]"#;
        let produce: Vec<ProduceItem> = normalize(text, &filter());

        assert_eq!(produce.len(), 1);
        assert_eq!(produce[0].produce, "Roma Tomato");
        assert_eq!(produce[0].freshness, "Slightly soft, deep red");
        assert_eq!(produce[0].lifespan_days(), 2);
    }

    #[test]
    fn test_lifespan_days_extraction() {
        let mk = |lifespan: &str| ProduceItem {
            produce: "x".to_string(),
            freshness: String::new(),
            expected_lifespan: lifespan.to_string(),
            timestamp: Utc::now(),
        };

        assert_eq!(mk("5 days").lifespan_days(), 5);
        assert_eq!(mk("about 12 days").lifespan_days(), 12);
        assert_eq!(mk("no estimate").lifespan_days(), 0);
        assert_eq!(mk("").lifespan_days(), 0);
    }

    #[test]
    fn test_freshness_buckets() {
        assert_eq!(FreshnessBucket::from_days(0), FreshnessBucket::Critical);
        assert_eq!(FreshnessBucket::from_days(1), FreshnessBucket::Critical);
        assert_eq!(FreshnessBucket::from_days(2), FreshnessBucket::Warning);
        assert_eq!(FreshnessBucket::from_days(3), FreshnessBucket::Warning);
        assert_eq!(FreshnessBucket::from_days(4), FreshnessBucket::Good);
    }

    #[test]
    fn test_row_filter_is_configurable() {
        let custom = RowFilter {
            names: vec!["unknown".to_string()],
            substrings: vec!["canned".to_string()],
        };
        assert!(custom.is_filler("unknown"));
        assert!(custom.is_filler("Canned Beans"));
        assert!(!custom.is_filler("N/A"));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let item = InventoryItem {
            item_name: "Apple".to_string(),
            count: 2,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert!(value.get("itemName").is_some());
        assert!(value.get("item_name").is_none());

        let produce = ProduceItem {
            produce: "Pear".to_string(),
            freshness: "ok".to_string(),
            expected_lifespan: "4 days".to_string(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&produce).unwrap();
        assert!(value.get("expectedLifespan").is_some());
    }
}
