//! Per-owner extraction debounce.
//!
//! At most one extraction trigger is allowed per owner per interval,
//! measured from that owner's previous *allowed* trigger. Denials never
//! touch state, and a trigger whose job could not be queued is handed back
//! with [`RateGate::release`]. Owners are independent keys of a `DashMap`, so no global
//! lock is taken.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

pub struct RateGate {
    /// `None` disables gating.
    interval: Option<Duration>,
    /// Owner id -> time of the last allowed trigger.
    last_trigger: DashMap<String, DateTime<Utc>>,
}

impl RateGate {
    /// A gate with a minimum interval of `min_interval_secs`. Zero or
    /// negative disables gating entirely.
    pub fn new(min_interval_secs: i64) -> Self {
        Self {
            interval: (min_interval_secs > 0).then(|| Duration::seconds(min_interval_secs)),
            last_trigger: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Whether an extraction may be queued for `owner_id` now.
    pub fn should_extract(&self, owner_id: &str) -> bool {
        self.should_extract_at(owner_id, Utc::now())
    }

    /// [`RateGate::should_extract`] with an explicit clock reading.
    pub fn should_extract_at(&self, owner_id: &str, now: DateTime<Utc>) -> bool {
        let Some(interval) = self.interval else {
            return true;
        };

        match self.last_trigger.entry(owner_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let elapsed = now - *entry.get();
                if elapsed < interval {
                    tracing::debug!(
                        owner_id,
                        elapsed_secs = elapsed.num_seconds(),
                        "Extraction throttled"
                    );
                    return false;
                }
                entry.insert(now);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Undo the trigger allowed for `owner_id` at `granted_at`.
    ///
    /// A later trigger recorded in the meantime is kept.
    pub fn release(&self, owner_id: &str, granted_at: DateTime<Utc>) {
        if self
            .last_trigger
            .remove_if(owner_id, |_, last| *last == granted_at)
            .is_some()
        {
            tracing::debug!(owner_id, "Extraction trigger released");
        }
    }

    /// Drop owners whose last trigger is at least one interval old. Such
    /// entries already behave as absent; this only reclaims memory.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let Some(interval) = self.interval else {
            return 0;
        };
        let before = self.last_trigger.len();
        self.last_trigger.retain(|_, last| now - *last < interval);
        before.saturating_sub(self.last_trigger.len())
    }

    /// Number of owners currently tracked.
    pub fn tracked(&self) -> usize {
        self.last_trigger.len()
    }
}
