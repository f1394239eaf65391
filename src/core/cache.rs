use crate::domain::model::{CacheEntry, Classification, Identifier};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Identifier to classification map with lazy TTL expiry. Stale entries stay
/// in the map until overwritten; reads just stop returning them. Unknown
/// outcomes get their own, shorter lifetime.
pub struct ProbeCache {
    ttl: Duration,
    unknown_ttl: Duration,
    enabled: bool,
    entries: Mutex<HashMap<Identifier, CacheEntry>>,
}

impl ProbeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            unknown_ttl: ttl,
            enabled: true,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A cache that never returns hits and stores nothing.
    pub fn disabled() -> Self {
        Self {
            ttl: Duration::zero(),
            unknown_ttl: Duration::zero(),
            enabled: false,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Unknown entries expire after `unknown_ttl`, never later than `ttl`.
    pub fn with_unknown_ttl(mut self, unknown_ttl: Duration) -> Self {
        self.unknown_ttl = unknown_ttl.min(self.ttl);
        self
    }

    pub fn get(&self, id: &Identifier, now: DateTime<Utc>) -> Option<Classification> {
        if !self.enabled {
            return None;
        }
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(id)?;
        let ttl = match entry.classification {
            Classification::Unknown => self.unknown_ttl,
            _ => self.ttl,
        };
        if now - entry.recorded_at > ttl {
            return None;
        }
        Some(entry.classification)
    }

    pub fn set(&self, id: Identifier, classification: Classification, now: DateTime<Utc>) {
        if !self.enabled {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                id,
                CacheEntry {
                    classification,
                    recorded_at: now,
                },
            );
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
