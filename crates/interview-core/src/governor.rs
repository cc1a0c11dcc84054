// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Rate Governor (C1) — counting semaphores per external provider, scoped
//! acquisition, and usage counters.
//!
//! Grounded on `services/rate_limiting.py`'s `APIRateLimiter`: one
//! semaphore per provider with a fixed capacity, a 5s acquisition timeout,
//! and active/total/error counters. The manual `acquire`/`release` pair is
//! translated into an RAII guard whose `Drop` always releases the slot and
//! decrements `active`, on every exit path including panics and early
//! returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use interview_config::RateLimitConfig;

/// The external providers the governor tracks slots for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    SttBatch,
    Tts,
    SttStream,
    Search,
}

impl Provider {
    fn as_str(&self) -> &'static str {
        match self {
            Provider::SttBatch => "assemblyai",
            Provider::Tts => "polly",
            Provider::SttStream => "deepgram",
            Provider::Search => "search",
        }
    }
}

#[derive(Default)]
struct Counters {
    active: AtomicU32,
    total_requests: AtomicU32,
    errors: AtomicU32,
}

struct Lane {
    semaphore: Arc<Semaphore>,
    counters: Counters,
}

/// Per-provider concurrency governor.
pub struct RateGovernor {
    lanes: HashMap<Provider, Lane>,
    acquire_timeout: Duration,
}

/// A single usage snapshot for one provider, returned by [`RateGovernor::stats`].
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ProviderStats {
    pub active: u32,
    pub available: u32,
    pub total_requests: u32,
    pub errors: u32,
}

/// RAII handle for an acquired slot. Dropping it releases the slot and
/// decrements the provider's `active` counter on every exit path —
/// success, early return, panic unwind, or task cancellation.
pub struct GovernorGuard<'a> {
    lane: &'a Lane,
    _permit: tokio::sync::SemaphorePermit<'a>,
}

impl Drop for GovernorGuard<'_> {
    fn drop(&mut self) {
        self.lane.counters.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RateGovernor {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        let mut lanes = HashMap::new();
        lanes.insert(Provider::SttBatch, Lane::new(cfg.assemblyai));
        lanes.insert(Provider::Tts, Lane::new(cfg.polly));
        lanes.insert(Provider::SttStream, Lane::new(cfg.deepgram));
        lanes.insert(Provider::Search, Lane::new(cfg.search));
        Self { lanes, acquire_timeout: cfg.acquire_timeout }
    }

    /// Acquire a slot for `provider`, bounded by the configured timeout.
    /// Returns `None` if the timeout elapsed before a slot became free —
    /// the governor never mints credit, so callers must not proceed to the
    /// external call on `None`.
    pub async fn acquire(&self, provider: Provider) -> Option<GovernorGuard<'_>> {
        let lane = self.lane(provider);
        lane.counters.total_requests.fetch_add(1, Ordering::SeqCst);

        match tokio::time::timeout(self.acquire_timeout, lane.semaphore.acquire()).await {
            Ok(Ok(permit)) => {
                lane.counters.active.fetch_add(1, Ordering::SeqCst);
                Some(GovernorGuard { lane, _permit: permit })
            }
            _ => {
                lane.counters.errors.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(provider = provider.as_str(), "capacity exhausted");
                None
            }
        }
    }

    /// Non-blocking peek: true if at least one slot is currently free.
    pub fn available(&self, provider: Provider) -> bool {
        self.lane(provider).semaphore.available_permits() > 0
    }

    pub fn stats(&self, provider: Provider) -> ProviderStats {
        let lane = self.lane(provider);
        ProviderStats {
            active: lane.counters.active.load(Ordering::SeqCst),
            available: lane.semaphore.available_permits() as u32,
            total_requests: lane.counters.total_requests.load(Ordering::SeqCst),
            errors: lane.counters.errors.load(Ordering::SeqCst),
        }
    }

    pub fn all_stats(&self) -> HashMap<&'static str, ProviderStats> {
        [Provider::SttBatch, Provider::Tts, Provider::SttStream, Provider::Search]
            .into_iter()
            .map(|p| (p.as_str(), self.stats(p)))
            .collect()
    }

    fn lane(&self, provider: Provider) -> &Lane {
        self.lanes.get(&provider).expect("every Provider variant has a lane")
    }
}

impl Lane {
    fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            counters: Counters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        interview_config::Config::default().rate_limits
    }

    #[tokio::test]
    async fn acquire_and_release_round_trip_restores_full_capacity() {
        let gov = RateGovernor::new(&test_config());
        {
            let _g1 = gov.acquire(Provider::Search).await.unwrap();
            let _g2 = gov.acquire(Provider::Search).await.unwrap();
            assert_eq!(gov.stats(Provider::Search).active, 2);
        }
        assert_eq!(gov.stats(Provider::Search).active, 0);
        assert_eq!(gov.stats(Provider::Search).available, 3);
    }

    #[tokio::test]
    async fn active_never_exceeds_capacity() {
        let mut cfg = test_config();
        cfg.search = 1;
        cfg.acquire_timeout = Duration::from_millis(50);
        let gov = RateGovernor::new(&cfg);

        let _slot = gov.acquire(Provider::Search).await.unwrap();
        assert!(gov.acquire(Provider::Search).await.is_none());
        assert_eq!(gov.stats(Provider::Search).errors, 1);
    }

    #[tokio::test]
    async fn available_reflects_free_slots() {
        let mut cfg = test_config();
        cfg.search = 2;
        let gov = RateGovernor::new(&cfg);
        assert!(gov.available(Provider::Search));
        let _g = gov.acquire(Provider::Search).await.unwrap();
        assert!(gov.available(Provider::Search));
        let _g2 = gov.acquire(Provider::Search).await.unwrap();
        assert!(!gov.available(Provider::Search));
    }

    #[tokio::test]
    async fn saturating_six_uploads_against_capacity_five_yields_one_rejection() {
        let mut cfg = test_config();
        cfg.assemblyai = 5;
        cfg.acquire_timeout = Duration::from_millis(20);
        let gov = Arc::new(RateGovernor::new(&cfg));

        let mut guards = Vec::new();
        for _ in 0..5 {
            guards.push(gov.acquire(Provider::SttBatch).await);
        }
        let sixth = gov.acquire(Provider::SttBatch).await;

        assert!(guards.iter().all(|g| g.is_some()));
        assert!(sixth.is_none());
    }
}
