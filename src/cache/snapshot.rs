//! Freshness-windowed entitlement snapshot.
//!
//! Holds the last successfully validated entitlement and when it was
//! validated. Nothing is persisted; a restart starts cold.

use crate::protocol::models::LicenseInfo;
use chrono::{DateTime, Utc};
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Snapshot {
    info: LicenseInfo,
    validated_at: DateTime<Utc>,
}

/// Cached entitlement with a freshness window.
#[derive(Debug)]
pub struct EntitlementCache {
    ttl: Duration,
    slot: RwLock<Option<Snapshot>>,
}

impl EntitlementCache {
    /// Create an empty cache with the given freshness window.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Return the snapshot if it was validated less than `ttl` ago.
    pub fn fresh(&self, now: DateTime<Utc>) -> Option<LicenseInfo> {
        let guard = self.slot.read().unwrap_or_else(|e| e.into_inner());
        let snapshot = guard.as_ref()?;

        let age_ms = now
            .signed_duration_since(snapshot.validated_at)
            .num_milliseconds();
        // A snapshot from the future means the clock moved backwards; treat as stale.
        if age_ms < 0 {
            return None;
        }
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        if age_ms < ttl_ms {
            Some(snapshot.info.clone())
        } else {
            None
        }
    }

    /// Replace the snapshot.
    pub fn store(&self, info: LicenseInfo, validated_at: DateTime<Utc>) {
        let mut guard = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Snapshot { info, validated_at });
    }

    /// Drop the snapshot.
    pub fn clear(&self) {
        let mut guard = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}
