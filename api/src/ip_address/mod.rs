use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Best effort client address.
///
/// Proxy headers win over the peer address. Header values are passed through
/// untouched, so a forwarded chain such as `"203.0.113.7, 10.0.0.2"` is
/// returned as is.
pub fn extract_client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> Option<String> {
    ["x-forwarded-for", "x-real-ip"]
        .into_iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .find(|value| !value.trim().is_empty())
        .map(str::to_string)
        // Fall back to direct connection IP
        .or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:51234".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));

        assert_eq!(
            extract_client_ip(&headers, peer()).as_deref(),
            Some("203.0.113.7")
        );
    }

    #[test]
    fn test_forwarded_chain_is_kept_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );

        assert_eq!(
            extract_client_ip(&headers, None).as_deref(),
            Some("203.0.113.7, 10.0.0.2")
        );
    }

    #[test]
    fn test_real_ip_used_when_forwarded_for_is_empty() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));

        assert_eq!(
            extract_client_ip(&headers, peer()).as_deref(),
            Some("198.51.100.1")
        );
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        assert_eq!(
            extract_client_ip(&HeaderMap::new(), peer()).as_deref(),
            Some("192.0.2.10")
        );
    }

    #[test]
    fn test_nothing_known_is_none() {
        assert_eq!(extract_client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_non_ascii_header_is_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_bytes(b"\xfa\xfb").unwrap(),
        );

        assert_eq!(
            extract_client_ip(&headers, peer()).as_deref(),
            Some("192.0.2.10")
        );
    }
}
