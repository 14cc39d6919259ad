//! API Key Selection
//!
//! Orders the usable keys for one dispatch call. Rotation starts at the active
//! key, else the primary configured key, else the first key, and wraps around
//! so every usable key is tried exactly once.

use crate::error::{Result, VivicaError};
use crate::store::key_state::KeyState;
use crate::store::key_suffix;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Trim keys, drop blanks and duplicates, keep first-seen order
pub fn dedupe_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    keys.into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Index rotation starts from
pub fn start_index(usable: &[String], active: Option<&str>, primary: &str) -> usize {
    active
        .and_then(|a| usable.iter().position(|k| k == a))
        .or_else(|| usable.iter().position(|k| k == primary))
        .unwrap_or(0)
}

/// Chooses key order and tracks dispatch-level cooldowns
#[derive(Debug, Clone)]
pub struct KeySelector {
    state: Arc<KeyState>,
}

impl KeySelector {
    pub fn new(state: Arc<KeyState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<KeyState> {
        &self.state
    }

    /// Keys not in the dispatch-level cooldown table
    pub fn available(&self, keys: &[String]) -> Vec<String> {
        keys.iter()
            .filter(|k| !self.state.is_in_cooldown(k))
            .cloned()
            .collect()
    }

    /// Circular order over `usable`, starting per the active/primary preference
    pub fn rotation(&self, usable: &[String], primary: &str) -> Result<Vec<String>> {
        if usable.is_empty() {
            return Err(VivicaError::AllKeysCoolingDown);
        }

        let active = self.state.active_key();
        let start = start_index(usable, active.as_deref(), primary.trim());
        debug!(
            start = %key_suffix(&usable[start]),
            candidates = usable.len(),
            "Key rotation selected"
        );

        Ok((0..usable.len())
            .map(|attempt| usable[(start + attempt) % usable.len()].clone())
            .collect())
    }

    /// Bench a key after an auth or rate-limit failure
    pub fn set_cooldown(&self, key: &str, duration: Duration) {
        self.state.set_cooldown(key, duration);
    }

    /// Make `key` the active key and lift any cooldown on it
    pub fn promote(&self, key: &str) {
        self.state.set_active_key(key);
        self.state.clear_cooldown(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ManualClock, MemoryStore, COOLDOWN};

    const T0: i64 = 1_700_000_000_000;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn selector() -> (KeySelector, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let state = KeyState::new(Arc::new(MemoryStore::new()), clock.clone());
        (KeySelector::new(Arc::new(state)), clock)
    }

    #[test]
    fn test_dedupe_keys() {
        let deduped = dedupe_keys([" key1 ", "", "key2", "key1", "   ", "key3"]);
        assert_eq!(deduped, keys(&["key1", "key2", "key3"]));
    }

    #[test]
    fn test_start_index_preference() {
        let usable = keys(&["key1", "key2", "key3"]);

        assert_eq!(start_index(&usable, Some("key3"), "key2"), 2);
        assert_eq!(start_index(&usable, Some("gone"), "key2"), 1);
        assert_eq!(start_index(&usable, None, "key2"), 1);
        assert_eq!(start_index(&usable, None, "missing"), 0);
    }

    #[test]
    fn test_rotation_covers_every_key_once() {
        let (selector, _) = selector();
        let usable = keys(&["key1", "key2", "key3", "key4"]);

        for (active, expected_start) in [("key1", 0), ("key2", 1), ("key3", 2), ("key4", 3)] {
            selector.state().set_active_key(active);
            let order = selector.rotation(&usable, "key1").unwrap();

            assert_eq!(order.len(), usable.len());
            assert_eq!(order[0], usable[expected_start]);
            for (i, key) in order.iter().enumerate() {
                assert_eq!(key, &usable[(expected_start + i) % usable.len()]);
            }
        }
    }

    #[test]
    fn test_rotation_without_active_key_uses_primary() {
        let (selector, _) = selector();
        let usable = keys(&["key1", "key2", "key3"]);

        let order = selector.rotation(&usable, "key2").unwrap();
        assert_eq!(order, keys(&["key2", "key3", "key1"]));

        let order = selector.rotation(&usable, "elsewhere").unwrap();
        assert_eq!(order, keys(&["key1", "key2", "key3"]));
    }

    #[test]
    fn test_rotation_of_nothing_fails() {
        let (selector, _) = selector();
        assert!(matches!(
            selector.rotation(&[], "key1"),
            Err(VivicaError::AllKeysCoolingDown)
        ));
    }

    #[test]
    fn test_cooled_keys_excluded_until_expiry() {
        let (selector, clock) = selector();
        let all = keys(&["key1", "key2"]);

        selector.set_cooldown("key1", COOLDOWN);
        assert_eq!(selector.available(&all), keys(&["key2"]));

        clock.set(T0 + 299_999);
        assert_eq!(selector.available(&all), keys(&["key2"]));

        clock.set(T0 + 300_000);
        assert_eq!(selector.available(&all), all);
    }

    #[test]
    fn test_promote_clears_cooldown() {
        let (selector, _) = selector();

        selector.set_cooldown("key1", COOLDOWN);
        selector.promote("key1");

        assert!(!selector.state().is_in_cooldown("key1"));
        assert_eq!(selector.state().active_key().as_deref(), Some("key1"));
    }
}
