//! Per-key request throttling

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Token bucket keyed by caller (an IPC client, a user, ...)
#[derive(Debug)]
pub struct RateLimiter<K> {
    capacity: u32,
    refill_every: Duration,
    buckets: HashMap<K, Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    refilled_at: Instant,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    /// Allow `capacity` requests per `refill_every` for each key
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        Self {
            capacity,
            refill_every,
            buckets: HashMap::new(),
        }
    }

    /// Consume a token for `key`, returning `false` when the bucket is empty
    pub fn check(&mut self, key: &K) -> bool {
        self.check_at(key, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit instant
    pub fn check_at(&mut self, key: &K, now: Instant) -> bool {
        let capacity = self.capacity;
        let bucket = self.buckets.entry(key.clone()).or_insert(Bucket {
            tokens: capacity,
            refilled_at: now,
        });

        let elapsed = now.saturating_duration_since(bucket.refilled_at);
        if !self.refill_every.is_zero() && elapsed >= self.refill_every {
            let periods = (elapsed.as_millis() / self.refill_every.as_millis()).min(u32::MAX as u128);
            bucket.tokens = bucket
                .tokens
                .saturating_add((periods as u32).saturating_mul(capacity))
                .min(capacity);
            bucket.refilled_at = now;
        }

        match bucket.tokens.checked_sub(1) {
            Some(left) => {
                bucket.tokens = left;
                true
            }
            None => false,
        }
    }

    /// Forget a key (e.g. on disconnect)
    pub fn remove(&mut self, key: &K) {
        self.buckets.remove(key);
    }

    /// Drop buckets untouched for longer than `idle`
    pub fn cleanup(&mut self, idle: Duration) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.refilled_at) < idle);
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}
