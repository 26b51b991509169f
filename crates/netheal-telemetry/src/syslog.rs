//! RFC3164-style syslog parsing
//!
//! Recognizes the `<PRI>MMM DD HH:MM:SS HOST MSG` shape. `facility = PRI/8`,
//! `severity = PRI%8`. Unparseable messages are flagged but still processed
//! with severity 6 (informational).

use once_cell::sync::Lazy;
use regex::Regex;

/// Severity assigned when the PRI cannot be parsed
pub const DEFAULT_SEVERITY: u8 = 6;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<(\d{1,3})>\s*([A-Z][a-z]{2}\s+\d{1,2}\s\d{2}:\d{2}:\d{2})\s+(\S+)\s+(.*)$")
        .expect("syslog header regex")
});

static PRI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<(\d{1,3})>\s*(.*)$").expect("syslog pri regex"));

/// Decoded syslog datagram
#[derive(Debug, Clone, PartialEq)]
pub struct SyslogMessage {
    pub facility: u8,
    pub severity: u8,
    /// Host field from the header, when present
    pub host: Option<String>,
    /// Raw header timestamp, when present
    pub timestamp: Option<String>,
    pub message: String,
    pub parse_error: bool,
}

/// Parse a raw syslog datagram
pub fn parse(raw: &str) -> SyslogMessage {
    let raw = raw.trim_end_matches(['\r', '\n']);

    if let Some(caps) = HEADER_RE.captures(raw) {
        // Full PRI + header + message shape
        let pri: u16 = caps[1].parse().unwrap_or(0);
        return SyslogMessage {
            facility: (pri / 8) as u8,
            severity: (pri % 8) as u8,
            host: Some(caps[3].to_string()),
            timestamp: Some(caps[2].to_string()),
            message: caps[4].to_string(),
            parse_error: false,
        };
    }

    if let Some(caps) = PRI_RE.captures(raw) {
        // PRI present but the header did not match
        let pri: u16 = caps[1].parse().unwrap_or(0);
        return SyslogMessage {
            facility: (pri / 8) as u8,
            severity: (pri % 8) as u8,
            host: None,
            timestamp: None,
            message: caps[2].to_string(),
            parse_error: false,
        };
    }

    SyslogMessage {
        facility: 0,
        severity: DEFAULT_SEVERITY,
        host: None,
        timestamp: None,
        message: raw.to_string(),
        parse_error: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_header_is_decoded() {
        let msg = parse("<131>Aug  1 12:00:01 core-r1 Interface GigabitEthernet0/1 is down");
        assert_eq!(msg.facility, 16);
        assert_eq!(msg.severity, 3);
        assert_eq!(msg.host.as_deref(), Some("core-r1"));
        assert_eq!(msg.message, "Interface GigabitEthernet0/1 is down");
        assert!(!msg.parse_error);
    }

    #[test]
    fn pri_without_header_still_decodes_severity() {
        let msg = parse("<14>something happened");
        assert_eq!(msg.facility, 1);
        assert_eq!(msg.severity, 6);
        assert!(msg.host.is_none());
        assert_eq!(msg.message, "something happened");
        assert!(!msg.parse_error);
    }

    #[test]
    fn garbage_is_flagged_but_kept() {
        let msg = parse("not a syslog line at all");
        assert!(msg.parse_error);
        assert_eq!(msg.severity, DEFAULT_SEVERITY);
        assert_eq!(msg.message, "not a syslog line at all");
    }

    #[test]
    fn trailing_newline_is_stripped() {
        let msg = parse("<131>Aug  1 12:00:01 core-r1 BGP neighbor 10.0.0.2 down\n");
        assert_eq!(msg.message, "BGP neighbor 10.0.0.2 down");
    }
}
