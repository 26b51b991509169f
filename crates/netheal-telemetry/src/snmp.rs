//! SNMP trap handling
//!
//! Trap payloads are opaque at this layer: the datagram is logged as a hex
//! preview and classified as a warning-severity `snmp_trap` event.

/// Maximum payload bytes included in the hex preview
const PREVIEW_BYTES: usize = 32;

/// Render the hex preview of a trap payload
pub fn hex_preview(payload: &[u8]) -> String {
    payload
        .iter()
        .take(PREVIEW_BYTES)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human-readable summary of a trap datagram
pub fn trap_summary(peer_ip: &str, payload: &[u8]) -> String {
    format!(
        "SNMP trap from {} ({} bytes): {}",
        peer_ip,
        payload.len(),
        hex_preview(payload)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_truncated() {
        let payload = vec![0xabu8; 64];
        let preview = hex_preview(&payload);
        assert_eq!(preview.split(' ').count(), PREVIEW_BYTES);
        assert!(preview.starts_with("ab ab"));
    }

    #[test]
    fn summary_includes_length() {
        let summary = trap_summary("10.0.0.1", &[0x30, 0x26]);
        assert!(summary.contains("10.0.0.1"));
        assert!(summary.contains("2 bytes"));
        assert!(summary.contains("30 26"));
    }
}
