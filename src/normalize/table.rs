// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Pipe-table fallback tier
//!
//! Some replies ignore the JSON instruction and render a markdown table
//! instead. This tier scans for a kind-specific header line and reads every
//! following `| ... |` row positionally.

use chrono::{DateTime, Utc};

use super::{Record, RowFilter};

/// Parse a pipe-delimited table rendering.
///
/// No header line means no table: the result is empty, which the caller
/// treats as "nothing detected" rather than an error.
pub(super) fn parse<R: Record>(text: &str, filter: &RowFilter, timestamp: DateTime<Utc>) -> Vec<R> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

    let header = match lines
        .iter()
        .position(|l| R::TABLE_MARKERS.iter().any(|m| l.contains(m)))
    {
        Some(i) => i,
        None => return Vec::new(),
    };

    let mut records = Vec::new();
    for line in &lines[header + 1..] {
        let line = line.trim();
        if !(line.starts_with('|') && line.ends_with('|')) {
            continue;
        }

        let cols: Vec<&str> = line
            .split('|')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();

        if let Some(record) = R::from_row(&cols, filter, timestamp) {
            records.push(record);
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{InventoryItem, ProduceItem};

    #[test]
    fn test_no_header_means_empty() {
        let rows: Vec<InventoryItem> =
            parse("| Banana | 3 |\n| Apple | 2 |", &RowFilter::default(), Utc::now());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_rows_before_header_are_ignored() {
        let text = "| Stray | 9 |\n| Item Name | Count |\n| Banana | 3 |";
        let rows: Vec<InventoryItem> = parse(text, &RowFilter::default(), Utc::now());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_name, "Banana");
    }

    #[test]
    fn test_non_pipe_lines_are_skipped() {
        let text = "| Produce | Freshness | Lifespan |\n\
                    some commentary in between\n\
                    | Kale | Crisp, deep green | 6 days |";
        let rows: Vec<ProduceItem> = parse(text, &RowFilter::default(), Utc::now());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].produce, "Kale");
    }

    #[test]
    fn test_short_rows_are_dropped() {
        // Inventory needs name + count, produce needs a third column
        let inv: Vec<InventoryItem> =
            parse("| Item Name | Count |\n| Banana |", &RowFilter::default(), Utc::now());
        assert!(inv.is_empty());

        let prod: Vec<ProduceItem> = parse(
            "| Produce | Freshness | Lifespan |\n| Kale | Crisp |",
            &RowFilter::default(),
            Utc::now(),
        );
        assert!(prod.is_empty());
    }
}
