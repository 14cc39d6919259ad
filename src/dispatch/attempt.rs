//! Attempt State Machine
//!
//! Tracks one dispatch call across its ordered keys, independent of HTTP.
//!
//! ```text
//! Selecting --next_attempt--> Attempting --succeed--> Succeeded
//!     ^                           |
//!     +----------fail-------------+
//! Selecting --(no keys left)--> ExhaustedRetryable
//! (no usable keys at all)  ---> ExhaustedFatal
//! ```

use crate::error::{FailureKind, VivicaError};

/// Why a call could not even start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    NoKeysConfigured,
    AllKeysCoolingDown,
}

/// Where a dispatch call stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Choosing the next key
    Selecting,

    /// Waiting on the request made with key number `attempt`
    Attempting { attempt: usize },

    /// Key number `attempt` got a 2xx
    Succeeded { attempt: usize },

    /// Every key was tried once; another model may still work
    ExhaustedRetryable { last_failure: Option<FailureKind> },

    /// Nothing to try
    ExhaustedFatal(FatalReason),
}

/// Ordered keys for one call and the state of working through them
#[derive(Debug, Clone)]
pub struct AttemptPlan {
    keys: Vec<String>,
    next: usize,
    last_failure: Option<FailureKind>,
    state: DispatchState,
}

impl AttemptPlan {
    /// Plan over keys already in rotation order
    pub fn new(keys: Vec<String>) -> Self {
        let state = if keys.is_empty() {
            DispatchState::ExhaustedFatal(FatalReason::AllKeysCoolingDown)
        } else {
            DispatchState::Selecting
        };
        Self {
            keys,
            next: 0,
            last_failure: None,
            state,
        }
    }

    /// A plan that never attempts anything
    pub fn fatal(reason: FatalReason) -> Self {
        Self {
            keys: Vec::new(),
            next: 0,
            last_failure: None,
            state: DispatchState::ExhaustedFatal(reason),
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Number of keys in the plan
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Move to the next untried key, or to exhaustion when none are left.
    /// Returns the attempt number and the key.
    pub fn next_attempt(&mut self) -> Option<(usize, String)> {
        if self.state != DispatchState::Selecting {
            return None;
        }

        match self.keys.get(self.next) {
            Some(key) => {
                let attempt = self.next;
                self.next += 1;
                self.state = DispatchState::Attempting { attempt };
                Some((attempt, key.clone()))
            }
            None => {
                self.state = DispatchState::ExhaustedRetryable {
                    last_failure: self.last_failure,
                };
                None
            }
        }
    }

    /// The current attempt succeeded
    pub fn succeed(&mut self) {
        if let DispatchState::Attempting { attempt } = self.state {
            self.state = DispatchState::Succeeded { attempt };
        }
    }

    /// The current attempt failed with `kind`
    pub fn fail(&mut self, kind: FailureKind) {
        if let DispatchState::Attempting { .. } = self.state {
            self.last_failure = Some(kind);
            self.state = DispatchState::Selecting;
        }
    }

    /// The error to report for an exhausted plan
    pub fn exhaustion_error(&self) -> VivicaError {
        match self.state {
            DispatchState::ExhaustedFatal(FatalReason::NoKeysConfigured) => {
                VivicaError::NoKeysConfigured
            }
            DispatchState::ExhaustedFatal(FatalReason::AllKeysCoolingDown) => {
                VivicaError::AllKeysCoolingDown
            }
            _ => VivicaError::exhausted(self.last_failure),
        }
    }
}
