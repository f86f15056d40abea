//! Default values applied when a configuration document omits a field.
//!
//! # Design
//! - Centralize defaults so JSON and environment loading agree.
//! - Keep durability defaults explicit for auditability.

/// Default rotation cadence in minutes.
pub(crate) const INTERVAL_MINUTES: u32 = 1;
/// Largest accepted rotation cadence (one day).
pub(crate) const MAX_INTERVAL_MINUTES: u32 = 24 * 60;
/// Default logger name.
pub(crate) const LOGGER_NAME: &str = "tidelog";
/// Default queue capacity for asynchronous delivery.
pub(crate) const QUEUE_CAPACITY: usize = 8192;
