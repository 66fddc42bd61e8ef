//! Foundational low-level utilities shared across relay crates.
//!
//! Provides atomic document writes, rotated NDJSON appends, and the clock
//! helpers used for tenant lifecycle stamps.

pub mod atomic_io;
pub mod log_rotation;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use log_rotation::{append_line_with_rotation, LogRotationPolicy};
pub use time_utils::{current_unix_timestamp_ms, monotonic_utc_after, utc_now};
