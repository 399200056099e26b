use get_if_addrs::get_if_addrs;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Guess the local IP address a receiver should use to reach this host.
///
/// Asks the OS which interface would route to a public address (no packet is
/// sent, UDP is connectionless). Falls back to the first non-loopback IPv4
/// interface address, then to `127.0.0.1`.
pub fn guess_local_ip() -> String {
    routed_ip()
        .or_else(|| lan_ipv4_addresses().into_iter().next())
        .unwrap_or(Ipv4Addr::LOCALHOST)
        .to_string()
}

fn routed_ip() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// Non-loopback IPv4 addresses of all interfaces, in interface order.
pub fn lan_ipv4_addresses() -> Vec<Ipv4Addr> {
    let Ok(interfaces) = get_if_addrs() else {
        return Vec::new();
    };

    let mut result = Vec::new();
    for iface in interfaces {
        if let IpAddr::V4(ip) = iface.ip() {
            if !ip.is_loopback() && !result.contains(&ip) {
                result.push(ip);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_local_ip_returns_valid_ipv4() {
        let ip = guess_local_ip();
        let parsed = ip.parse::<IpAddr>().expect("Should return a valid IP address");
        assert!(parsed.is_ipv4(), "Should return an IPv4 address");
    }

    #[test]
    fn test_lan_addresses_exclude_loopback() {
        let ips = lan_ipv4_addresses();
        assert!(ips.iter().all(|ip| !ip.is_loopback()));

        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), ips.len(), "No duplicate addresses");
    }
}
