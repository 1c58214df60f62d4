//! Virtual host clearing

/// Reduce a client-reported virtual host to a bare, lowercase hostname
///
/// Drops everything the client or an edge proxy may have appended to the
/// hostname: the Forge marker (from the first NUL), the TCPShield marker
/// (from the first `///`), a `:port` suffix and a trailing dot.
pub fn clear_virtual_host(raw: &str) -> String {
    let host = raw.split('\0').next().unwrap_or(raw);
    let host = host.split("///").next().unwrap_or(host);
    let host = strip_port(host.trim());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn strip_port(host: &str) -> &str {
    // [v6] or [v6]:port
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((addr, _)) => addr,
            None => host,
        };
    }

    match host.rsplit_once(':') {
        // A bare IPv6 address has more than one colon; leave it alone
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}
