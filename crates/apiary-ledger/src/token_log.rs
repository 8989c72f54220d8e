//! Bounded log of applied idempotency tokens.
//!
//! Each player record remembers the tokens of mutations already applied
//! so a retried request is recognized and not re-applied. The log is
//! bounded: once it exceeds its capacity the oldest tokens are evicted,
//! which is safe because retries arrive within seconds, not hours.

use std::collections::{BTreeSet, VecDeque};

use apiary_types::RequestToken;

/// How many applied tokens each player record remembers.
const TOKEN_CAPACITY: usize = 1_024;

/// A capacity-bounded, insertion-ordered set of request tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenLog {
    order: VecDeque<RequestToken>,
    seen: BTreeSet<RequestToken>,
}

impl TokenLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `token` was already applied (and not yet evicted).
    pub fn contains(&self, token: RequestToken) -> bool {
        self.seen.contains(&token)
    }

    /// Record `token` as applied, evicting the oldest entry when the
    /// capacity is exceeded. Recording the same token twice is a no-op.
    pub fn push(&mut self, token: RequestToken) {
        if !self.seen.insert(token) {
            return;
        }
        self.order.push_back(token);
        while self.order.len() > TOKEN_CAPACITY {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
    }

    /// Number of tokens currently remembered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
