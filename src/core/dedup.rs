//! Bounded set of already-notified transaction identifiers
//!
//! Shared across every sweep cycle. A confirmation timeout makes the
//! engine proceed as if the transfer succeeded; if the same
//! transaction is observed again later, this set keeps the user from
//! being notified twice.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use crate::utils::constants::{DEDUP_SOFT_CAP, DEDUP_TRIM_TO};

#[derive(Default)]
struct DedupInner {
    seen: HashSet<String>,
    /// Insertion order, oldest first, for overflow trimming
    order: VecDeque<String>,
}

/// Append-checked processed-transaction set with a soft cap
#[derive(Default)]
pub struct Deduplicator {
    inner: Mutex<DedupInner>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transaction identifier. Returns true only the first
    /// time an identifier is seen; callers notify on true.
    pub fn mark(&self, tx_id: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if inner.seen.contains(tx_id) {
            return false;
        }

        inner.seen.insert(tx_id.to_string());
        inner.order.push_back(tx_id.to_string());

        if inner.order.len() > DEDUP_SOFT_CAP {
            while inner.order.len() > DEDUP_TRIM_TO {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.seen.remove(&oldest);
                }
            }
        }

        true
    }

    /// Whether an identifier has already been reported
    pub fn contains(&self, tx_id: &str) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.seen.contains(tx_id)
    }

    /// Number of remembered identifiers
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
