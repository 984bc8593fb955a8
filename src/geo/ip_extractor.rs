//! Client IP extraction from HTTP headers with trust validation
//!
//! - Supports the vendor-specific `CF-Connecting-IP` header
//! - Walks `Forwarded` / `X-Forwarded-For` chains right to left, skipping trusted proxies
//! - Falls back to the socket remote address when headers are untrusted

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{GeoConfig, TrustedProxyMode};

/// Extract the client IP address according to the configured trust mode
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr, config: &GeoConfig) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => {
            let chain = forwarded_chain(headers);
            select_from_chain(&chain, socket_addr, config).unwrap_or(socket_addr)
        }
        TrustedProxyMode::None => socket_addr,
    }
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Hop addresses, client first; RFC 7239 `Forwarded` wins over `X-Forwarded-For`
fn forwarded_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    let from_forwarded = parse_forwarded(headers);
    if !from_forwarded.is_empty() {
        return from_forwarded;
    }
    parse_x_forwarded_for(headers)
}

/// Parse `Forwarded: for=192.0.2.60;proto=http, for="[2001:db8::1]:4711"`
fn parse_forwarded(headers: &HeaderMap) -> Vec<IpAddr> {
    let Some(forwarded) = headers.get("forwarded").and_then(|h| h.to_str().ok()) else {
        return Vec::new();
    };

    forwarded
        .split(',')
        .filter_map(|element| {
            element.split(';').find_map(|param| {
                let param = param.trim();
                let (key, value) = param.split_once('=')?;
                if !key.trim().eq_ignore_ascii_case("for") {
                    return None;
                }
                parse_node(value.trim().trim_matches('"'))
            })
        })
        .collect()
}

/// A forwarded node: bare address, `addr:port`, or `[v6]:port`
fn parse_node(node: &str) -> Option<IpAddr> {
    if let Some(rest) = node.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }
    if let Ok(ip) = node.parse::<IpAddr>() {
        return Some(ip);
    }
    // IPv4 with port
    node.rsplit_once(':')
        .and_then(|(host, _port)| host.parse::<std::net::Ipv4Addr>().ok())
        .map(IpAddr::V4)
}

fn parse_x_forwarded_for(headers: &HeaderMap) -> Vec<IpAddr> {
    let Some(xff) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) else {
        return Vec::new();
    };

    xff.split(',')
        .filter_map(|s| parse_node(s.trim()))
        .collect()
}

fn is_trusted_proxy(ip: IpAddr, config: &GeoConfig) -> bool {
    config.trusted_proxies.iter().any(|net| net.contains(&ip))
}

/// Pick the client address out of a forwarding chain
fn select_from_chain(chain: &[IpAddr], socket_addr: IpAddr, config: &GeoConfig) -> Option<IpAddr> {
    if chain.is_empty() {
        return None;
    }

    // A fixed number of proxies in front of us: skip that many from the right
    if let Some(num_trusted) = config.num_trusted_proxies {
        if chain.len() > num_trusted {
            return Some(chain[chain.len() - num_trusted - 1]);
        }
        return chain.first().copied();
    }

    if !config.trusted_proxies.is_empty() {
        // Only believe the headers if they were added by a trusted peer
        if !is_trusted_proxy(socket_addr, config) {
            return None;
        }
        // First untrusted hop from the right is the client
        return chain
            .iter()
            .rev()
            .find(|ip| !is_trusted_proxy(**ip, config))
            .or_else(|| chain.first())
            .copied();
    }

    chain.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn create_config(mode: TrustedProxyMode) -> GeoConfig {
        GeoConfig {
            trusted_proxy_mode: mode,
            ..GeoConfig::disabled()
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_extract_client_ip_none_mode() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::None);

        assert_eq!(extract_client_ip(&headers, ip("192.168.1.1"), &config), ip("192.168.1.1"));
    }

    #[test]
    fn test_extract_cloudflare_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::Cloudflare);

        assert_eq!(extract_client_ip(&headers, ip("192.168.1.1"), &config), ip("203.0.113.1"));
    }

    #[test]
    fn test_cloudflare_mode_without_header_uses_socket() {
        let config = create_config(TrustedProxyMode::Cloudflare);
        assert_eq!(
            extract_client_ip(&HeaderMap::new(), ip("192.168.1.1"), &config),
            ip("192.168.1.1")
        );
    }

    #[test]
    fn test_x_forwarded_for_without_trust_config_uses_rightmost() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        let config = create_config(TrustedProxyMode::Standard);

        assert_eq!(extract_client_ip(&headers, ip("192.168.1.1"), &config), ip("198.51.100.1"));
    }

    #[test]
    fn test_num_trusted_proxies_skips_from_the_right() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1, 10.0.0.2"),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.num_trusted_proxies = Some(1);

        assert_eq!(extract_client_ip(&headers, ip("10.0.0.1"), &config), ip("198.51.100.1"));
    }

    #[test]
    fn test_trusted_cidrs_find_first_untrusted_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.7, 203.0.113.1, 10.1.2.3"),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.trusted_proxies = vec!["10.0.0.0/8".parse().unwrap()];

        assert_eq!(extract_client_ip(&headers, ip("10.0.0.1"), &config), ip("203.0.113.1"));
    }

    #[test]
    fn test_trusted_cidrs_ignore_headers_from_untrusted_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.7"));
        let mut config = create_config(TrustedProxyMode::Standard);
        config.trusted_proxies = vec!["10.0.0.0/8".parse().unwrap()];

        assert_eq!(extract_client_ip(&headers, ip("203.0.113.50"), &config), ip("203.0.113.50"));
    }

    #[test]
    fn test_forwarded_header_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "forwarded",
            HeaderValue::from_static("for=192.0.2.60;proto=http, For=\"[2001:db8:cafe::17]:4711\""),
        );
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::Standard);

        assert_eq!(
            extract_client_ip(&headers, ip("192.168.1.1"), &config),
            ip("2001:db8:cafe::17")
        );
    }

    #[test]
    fn test_parse_node_variants() {
        assert_eq!(parse_node("192.0.2.60:8080"), Some(ip("192.0.2.60")));
        assert_eq!(parse_node("[::1]:80"), Some(ip("::1")));
        assert_eq!(parse_node("2001:db8::1"), Some(ip("2001:db8::1")));
        assert_eq!(parse_node("unknown"), None);
    }
}
