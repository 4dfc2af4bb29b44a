// SPDX-License-Identifier: MIT
#![no_main]

use libfuzzer_sys::fuzz_target;
use pantryscan::normalize::{normalize, InventoryItem, ProduceItem, RowFilter};

// Normalization is total: no input may panic or error, for either kind.
fuzz_target!(|text: &str| {
    let filter = RowFilter::default();
    let _: Vec<InventoryItem> = normalize(text, &filter);
    let _: Vec<ProduceItem> = normalize(text, &filter);
});
