// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use aifiles::category::{parse_category, Category};
use aifiles::naming::{normalize_dates, sanitize_name};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct ModelReply {
    reply: String,
    max_len: u8,
}

fuzz_target!(|input: ModelReply| {
    let category = parse_category(&input.reply);
    assert!(Category::ALL.contains(&category));

    let max_len = usize::from(input.max_len).max(1);
    let name = sanitize_name(&input.reply, max_len);
    assert!(name.chars().count() <= max_len);
    assert!(!name.contains(['/', '\\', ':', '\0']));

    let _ = normalize_dates(&name);
});
