//! BPF filter builders

/// DNS candidates: every UDP datagram, queries are picked out by parsing
pub fn dns_filter() -> String {
    "udp".to_string()
}
