//! Identifier generation
//!
//! Ids are assigned by the core when absent and stable afterwards:
//! `ALT-<base36-ts>-<rand>` for alerts, `RCA-<base36-ts>-<rand>` for RCA
//! hypotheses, and `PFX-YYYYMMDD-NNNN` day-scoped sequences for incidents,
//! actions, policies and topologies.

use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Encode a number in base36 (0-9, a-z)
pub fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

fn rand_suffix() -> String {
    let mut rng = rand::thread_rng();
    base36(rng.gen_range(0..36u64.pow(4)))
}

fn timestamp_tag() -> String {
    base36(Utc::now().timestamp_millis() as u64)
}

/// Generate a new alert id
pub fn alert_id() -> String {
    format!("ALT-{}-{}", timestamp_tag(), rand_suffix())
}

/// Generate a new RCA hypothesis id
pub fn rca_id() -> String {
    format!("RCA-{}-{}", timestamp_tag(), rand_suffix())
}

/// Day-scoped sequence generator for incident/action/policy/topology ids
#[derive(Debug, Default)]
pub struct IdGenerator {
    incidents: AtomicU64,
    actions: AtomicU64,
    policies: AtomicU64,
    topologies: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn sequenced(prefix: &str, counter: &AtomicU64) -> String {
        let seq = counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}-{:04}", prefix, Utc::now().format("%Y%m%d"), seq)
    }

    pub fn next_incident_id(&self) -> String {
        Self::sequenced("INC", &self.incidents)
    }

    pub fn next_action_id(&self) -> String {
        Self::sequenced("ACT", &self.actions)
    }

    pub fn next_policy_id(&self) -> String {
        Self::sequenced("POL", &self.policies)
    }

    pub fn next_topology_id(&self) -> String {
        Self::sequenced("TOP", &self.topologies)
    }
}
