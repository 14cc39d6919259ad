//! Shared Key State
//!
//! The dispatch-level cooldown table and the active (last successful) key.
//! One instance is meant to be shared by every [`ChatService`](crate::ChatService)
//! in the process. State is loaded from storage on first use and written
//! through on every mutation. Concurrent writers race and the last write wins.

use crate::store::clock::{duration_ms, Clock};
use crate::store::credentials::key_suffix;
use crate::store::storage::{load_json, save_json, KeyValueStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Storage key for the cooldown table (full key -> expiry epoch ms)
pub const COOLDOWNS_KEY: &str = "vivica-key-cooldowns";

/// Storage key for the active key
pub const ACTIVE_KEY_KEY: &str = "vivica-active-api-key";

#[derive(Debug, Default)]
struct Loaded {
    cooldowns: HashMap<String, i64>,
    active_key: Option<String>,
}

/// Cooldown table plus active key
pub struct KeyState {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Option<Loaded>>,
}

impl KeyState {
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            inner: Mutex::new(None),
        }
    }

    fn with_loaded<R>(&self, f: impl FnOnce(&mut Loaded) -> R) -> R {
        let mut guard = self.inner.lock();
        let loaded = guard.get_or_insert_with(|| {
            let cooldowns = load_json(self.storage.as_ref(), COOLDOWNS_KEY).unwrap_or_default();
            let active_key = match self.storage.get(ACTIVE_KEY_KEY) {
                Ok(key) => key.filter(|k| !k.is_empty()),
                Err(e) => {
                    warn!(error = %e, "Failed to read active key");
                    None
                }
            };
            Loaded {
                cooldowns,
                active_key,
            }
        });
        f(loaded)
    }

    /// An empty table is removed rather than stored
    fn persist_cooldowns(&self, cooldowns: &HashMap<String, i64>) {
        if !cooldowns.is_empty() {
            save_json(self.storage.as_ref(), COOLDOWNS_KEY, cooldowns);
        } else if let Err(e) = self.storage.remove(COOLDOWNS_KEY) {
            warn!(error = %e, "Failed to clear cooldown table");
        }
    }

    /// The key that most recently succeeded, if any
    pub fn active_key(&self) -> Option<String> {
        self.with_loaded(|state| state.active_key.clone())
    }

    /// Remember `key` as the active key
    pub fn set_active_key(&self, key: &str) {
        self.with_loaded(|state| {
            state.active_key = Some(key.to_string());
            if let Err(e) = self.storage.set(ACTIVE_KEY_KEY, key) {
                warn!(error = %e, "Failed to persist active key");
            }
        });
    }

    /// Bench `key` for `duration`
    pub fn set_cooldown(&self, key: &str, duration: Duration) {
        let until = self.clock.now_ms().saturating_add(duration_ms(duration));
        self.with_loaded(|state| {
            state.cooldowns.insert(key.to_string(), until);
            self.persist_cooldowns(&state.cooldowns);
        });
        debug!(key = %key_suffix(key), until, "Key placed in cooldown");
    }

    /// Drop any cooldown for `key`
    pub fn clear_cooldown(&self, key: &str) {
        self.with_loaded(|state| {
            if state.cooldowns.remove(key).is_some() {
                self.persist_cooldowns(&state.cooldowns);
            }
        });
    }

    /// Whether `key` is benched. Expired entries are evicted here.
    pub fn is_in_cooldown(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.with_loaded(|state| match state.cooldowns.get(key) {
            None => false,
            Some(&until) if now >= until => {
                state.cooldowns.remove(key);
                self.persist_cooldowns(&state.cooldowns);
                false
            }
            Some(_) => true,
        })
    }
}

impl std::fmt::Debug for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.inner.lock();
        f.debug_struct("KeyState")
            .field("loaded", &guard.is_some())
            .field(
                "cooling_down",
                &guard.as_ref().map(|s| s.cooldowns.len()).unwrap_or(0),
            )
            .finish()
    }
}
