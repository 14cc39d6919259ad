//! Store Module
//!
//! Persistent key-value storage, the clock, per-key telemetry and the shared
//! cooldown/active-key state.

pub mod clock;
pub mod credentials;
pub mod key_state;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{key_suffix, CredentialStore, KeyTelemetry, KeyUsageRecord, COOLDOWN};
pub use key_state::KeyState;
pub use storage::{load_json, save_json, KeyValueStore, MemoryStore, SledStore};
