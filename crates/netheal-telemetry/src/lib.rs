//! UDP telemetry collector for the NetHeal pipeline
//!
//! Receives syslog and SNMP-trap datagrams, normalizes them into a common
//! event shape, applies rate limiting and duplicate coalescing, and emits
//! `alert_created` events for the correlation stage.

pub mod classify;
pub mod collector;
pub mod rate_limit;
pub mod snmp;
pub mod syslog;

pub use collector::{NormalizedEvent, RawEvent, TelemetryCollector};
pub use rate_limit::{EventBuffer, RateLimiter};
pub use syslog::SyslogMessage;
