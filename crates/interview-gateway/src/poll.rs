// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Exponential poll-interval hint for `/interview/final-summary-status`:
//! `min(1000 * 2^min(poll_count-1, 3), 10000)`, i.e. 1s, 2s, 4s, 8s, 10s, …
//! Terminal states (`completed`/`error`) always hint `0` — the client has
//! no reason to poll again.

/// `poll_count` is 1-based, matching the client's own counter (its first
/// poll is `poll_count=1`).
pub fn suggested_poll_interval_ms(poll_count: u32) -> u64 {
    let exponent = poll_count.saturating_sub(1).min(3);
    let interval = 1000u64.saturating_mul(1u64 << exponent);
    interval.min(10_000)
}
