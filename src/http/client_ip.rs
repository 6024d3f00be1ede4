//! Visitor IP extraction.
//!
//! Policy: the first comma-separated entry of `X-Forwarded-For`, trimmed, when
//! present and non-empty; otherwise the socket remote address. The recorded
//! value feeds the visit ledger, so the policy is fixed here and unit-tested.

use axum::http::HeaderMap;
use std::net::IpAddr;

pub fn client_ip(headers: &HeaderMap, remote: IpAddr) -> String {
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    remote.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn remote() -> IpAddr {
        "192.168.1.1".parse().unwrap()
    }

    #[test]
    fn test_no_header_uses_remote() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, remote()), "192.168.1.1");
    }

    #[test]
    fn test_first_forwarded_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        assert_eq!(client_ip(&headers, remote()), "203.0.113.1");
    }

    #[test]
    fn test_entry_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("  203.0.113.9 , 198.51.100.1"),
        );
        assert_eq!(client_ip(&headers, remote()), "203.0.113.9");
    }

    #[test]
    fn test_empty_header_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("   "));
        assert_eq!(client_ip(&headers, remote()), "192.168.1.1");

        headers.insert("x-forwarded-for", HeaderValue::from_static(", 10.0.0.1"));
        assert_eq!(client_ip(&headers, remote()), "192.168.1.1");
    }

    #[test]
    fn test_ipv6_remote() {
        let headers = HeaderMap::new();
        let remote: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(client_ip(&headers, remote), "2001:db8::1");
    }
}
