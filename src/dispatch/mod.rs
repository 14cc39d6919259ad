//! Dispatch Module
//!
//! The per-call attempt state machine and the key-rotating dispatcher.

pub mod attempt;
pub mod dispatcher;

pub use attempt::{AttemptPlan, DispatchState, FatalReason};
pub use dispatcher::Dispatcher;
