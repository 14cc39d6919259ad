//! Credential Telemetry
//!
//! Per-key success/failure counters with a telemetry-level cooldown. Keys are
//! recorded under their last four characters only, so two keys sharing a
//! suffix share one record.

use crate::store::clock::{duration_ms, Clock};
use crate::store::storage::{load_json, save_json, KeyValueStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long a failing key is benched
pub const COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Storage key for the telemetry blob
pub const TELEMETRY_KEY: &str = "vivica-key-telemetry";

/// Last four characters of a key, used for display, logs and telemetry
pub fn key_suffix(key: &str) -> &str {
    key.char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| &key[i..])
        .unwrap_or(key)
}

/// Usage counters for one key suffix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyUsageRecord {
    #[serde(default)]
    pub success: u64,

    #[serde(default)]
    pub failures: u64,

    /// Epoch ms until which the key is considered cooling down
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<i64>,
}

/// The persisted telemetry blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTelemetry {
    #[serde(default)]
    pub key_usage: HashMap<String, KeyUsageRecord>,

    /// Suffix of the key that last succeeded
    #[serde(default)]
    pub last_used_key: String,
}

/// Telemetry store, loaded once at construction and written back on every change
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    telemetry: Mutex<KeyTelemetry>,
}

impl CredentialStore {
    /// Load telemetry from storage; unreadable state starts fresh
    pub fn load(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let telemetry = load_json(storage.as_ref(), TELEMETRY_KEY).unwrap_or_default();
        Self {
            storage,
            clock,
            telemetry: Mutex::new(telemetry),
        }
    }

    /// Count an attempt. Failures bench the key for [`COOLDOWN`].
    pub fn record_outcome(&self, key: &str, success: bool) {
        let suffix = key_suffix(key).to_string();
        let now = self.clock.now_ms();

        let mut telemetry = self.telemetry.lock();
        let usage = telemetry.key_usage.entry(suffix.clone()).or_default();
        if success {
            usage.success += 1;
            usage.cooldown_until = None;
            telemetry.last_used_key = suffix.clone();
        } else {
            usage.failures += 1;
            usage.cooldown_until = Some(now.saturating_add(duration_ms(COOLDOWN)));
        }
        debug!(key = %suffix, success, "Recorded key outcome");

        save_json(self.storage.as_ref(), TELEMETRY_KEY, &*telemetry);
    }

    /// Whether the key's telemetry record is still cooling down
    pub fn is_in_cooldown(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.telemetry
            .lock()
            .key_usage
            .get(key_suffix(key))
            .and_then(|u| u.cooldown_until)
            .is_some_and(|until| until > now)
    }

    /// Counters for one key
    pub fn usage(&self, key: &str) -> Option<KeyUsageRecord> {
        self.telemetry.lock().key_usage.get(key_suffix(key)).cloned()
    }

    /// Snapshot of all telemetry
    pub fn stats(&self) -> KeyTelemetry {
        self.telemetry.lock().clone()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("tracked_keys", &self.telemetry.lock().key_usage.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::clock::ManualClock;
    use crate::store::storage::MemoryStore;

    const T0: i64 = 1_700_000_000_000;

    fn store() -> (CredentialStore, Arc<MemoryStore>, Arc<ManualClock>) {
        let storage = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let creds = CredentialStore::load(storage.clone(), clock.clone());
        (creds, storage, clock)
    }

    #[test]
    fn test_key_suffix() {
        assert_eq!(key_suffix("sk-or-v1-abcdef1234"), "1234");
        assert_eq!(key_suffix("abc"), "abc");
        assert_eq!(key_suffix("ключ-éèêë"), "éèêë");
    }

    #[test]
    fn test_failure_sets_cooldown() {
        let (creds, _, clock) = store();

        creds.record_outcome("sk-aaaa1111", false);
        assert!(creds.is_in_cooldown("sk-aaaa1111"));
        assert_eq!(
            creds.usage("sk-aaaa1111").unwrap().cooldown_until,
            Some(T0 + 300_000)
        );

        clock.advance(COOLDOWN - Duration::from_millis(1));
        assert!(creds.is_in_cooldown("sk-aaaa1111"));

        clock.advance(Duration::from_millis(1));
        assert!(!creds.is_in_cooldown("sk-aaaa1111"));
    }

    #[test]
    fn test_success_clears_cooldown() {
        let (creds, _, _) = store();

        creds.record_outcome("sk-aaaa1111", false);
        creds.record_outcome("sk-aaaa1111", true);

        let usage = creds.usage("sk-aaaa1111").unwrap();
        assert_eq!(usage.success, 1);
        assert_eq!(usage.failures, 1);
        assert_eq!(usage.cooldown_until, None);
        assert_eq!(creds.stats().last_used_key, "1111");
        assert!(!creds.is_in_cooldown("sk-aaaa1111"));
    }

    #[test]
    fn test_shared_suffix_collides() {
        let (creds, _, _) = store();

        creds.record_outcome("first-key-9999", false);
        assert!(creds.is_in_cooldown("other-key-9999"));
    }

    #[test]
    fn test_persists_on_every_mutation() {
        let (creds, storage, clock) = store();

        creds.record_outcome("sk-aaaa1111", true);
        creds.record_outcome("sk-bbbb2222", false);

        let raw = storage.get(TELEMETRY_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["keyUsage"]["1111"]["success"], 1);
        assert_eq!(json["keyUsage"]["2222"]["failures"], 1);
        assert_eq!(json["lastUsedKey"], "1111");
        assert!(!raw.contains("sk-aaaa"));

        let reloaded = CredentialStore::load(storage, clock);
        assert_eq!(reloaded.stats(), creds.stats());
    }

    #[test]
    fn test_corrupt_telemetry_starts_fresh() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(TELEMETRY_KEY, "][").unwrap();

        let creds = CredentialStore::load(storage, Arc::new(ManualClock::new(T0)));
        assert_eq!(creds.stats(), KeyTelemetry::default());
    }
}
