// src/core/netutil.rs

//! Local network address discovery, used to build the join URL that the
//! host application renders for operator onboarding.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Returns the first routable IPv4 address of this host, or `None` if
/// discovery fails (e.g. no network interface is up).
///
/// Uses the connected-UDP-socket trick: no packet is sent, the OS just
/// resolves which local address would be used to reach the target.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() => Some(ip),
        _ => None,
    }
}

/// Builds the WebSocket join URL operators connect to.
pub fn join_url(ip: Ipv4Addr, port: u16) -> String {
    format!("ws://{ip}:{port}")
}
