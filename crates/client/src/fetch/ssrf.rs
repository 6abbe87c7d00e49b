//! SSRF (Server-Side Request Forgery) protection.
//!
//! Item URLs come from end users, so every host is resolved and each answer
//! checked against private and reserved ranges before anything is fetched.

use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;
use url::{Host, Url};

/// Ranges never fetched, beyond what `std` classifies as loopback/private.
static BLOCKED_NETS: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    [
        "0.0.0.0/8",
        "100.64.0.0/10",
        "169.254.0.0/16",
        "192.0.0.0/24",
        "198.18.0.0/15",
        "224.0.0.0/4",
        "240.0.0.0/4",
        "fc00::/7",
        "fe80::/10",
        "ff00::/8",
    ]
    .iter()
    .filter_map(|net| net.parse().ok())
    .collect()
});

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),

    #[error("URL has no host")]
    MissingHost,
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// IPv4-mapped IPv6 addresses are judged by their IPv4 form.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    };

    let std_blocked = match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_broadcast() || v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    };

    std_blocked || BLOCKED_NETS.iter().any(|net| net.contains(&ip))
}

/// Validate that an IP address is not private or reserved.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Reject a URL whose host is a blocked IP literal or `localhost`.
///
/// Does no DNS lookup, so it can run inside the redirect policy.
pub fn validate_literal_host(url: &Url) -> Result<(), SsrfError> {
    match url.host() {
        Some(Host::Ipv4(ip)) => validate_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => validate_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if domain == "localhost" || domain.ends_with(".localhost") {
                Err(SsrfError::BlockedIp(IpAddr::V4(Ipv4Addr::LOCALHOST)))
            } else {
                Ok(())
            }
        }
        None => Err(SsrfError::MissingHost),
    }
}

/// Resolve the URL's host and reject it if any answer is blocked.
pub async fn validate_url_host(url: &Url) -> Result<(), SsrfError> {
    let host = url.host_str().ok_or(SsrfError::MissingHost)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        return validate_ip(ip);
    }

    let port = url.port_or_known_default().unwrap_or(443);
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| SsrfError::DnsError(format!("{host}: {e}")))?;

    let mut resolved_any = false;
    for addr in addrs {
        resolved_any = true;
        validate_ip(addr.ip())?;
    }

    if !resolved_any {
        return Err(SsrfError::DnsError(format!("{host}: no addresses")));
    }

    Ok(())
}
