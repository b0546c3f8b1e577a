//! Caller identity, client IP and the guest usage cookie.

use std::net::{IpAddr, SocketAddr};

use axum::http::{header, HeaderMap, HeaderValue};
use creditgate_types::CallerIdentity;

/// Set by the authentication gateway in front of this service.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Guest cookie lifetime, a little over one accounting period.
const COOKIE_MAX_AGE_SECS: u64 = 40 * 24 * 60 * 60;

pub fn caller_identity(headers: &HeaderMap, cookie_name: &str) -> CallerIdentity {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match user_id {
        Some(user_id) => CallerIdentity::authenticated(user_id),
        None => CallerIdentity::guest(read_cookie(headers, cookie_name)),
    }
}

pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Rate-limit key for the caller.
///
/// With `trust_forwarded` the first `x-forwarded-for` hop wins, then
/// `x-real-ip`, then the socket peer. Clients can set those headers freely,
/// so trusting them requires a reverse proxy that overwrites both.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    let forwarded = || {
        headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.trim().parse().ok())
            })
    };

    trust_forwarded
        .then(forwarded)
        .flatten()
        .or_else(|| peer.map(|addr| addr.ip()))
        .map_or_else(|| "unknown".to_string(), |ip| ip.to_string())
}

pub fn usage_cookie(name: &str, token: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={COOKIE_MAX_AGE_SECS}"
    ))
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_user_header_wins_over_cookie() {
        let h = headers(&[("x-user-id", "u-42"), ("cookie", "cg_usage_banner=abc.def")]);
        assert_eq!(caller_identity(&h, "cg_usage_banner"), CallerIdentity::authenticated("u-42"));
    }

    #[test]
    fn test_guest_reads_own_service_cookie() {
        let h = headers(&[("cookie", "theme=dark; cg_usage_copy=zzz.yyy; cg_usage_banner=abc.def")]);
        assert_eq!(
            caller_identity(&h, "cg_usage_banner"),
            CallerIdentity::guest(Some("abc.def".to_string()))
        );
        assert_eq!(read_cookie(&h, "cg_usage_chat"), None);
    }

    #[test]
    fn test_blank_user_header_is_guest() {
        let h = headers(&[("x-user-id", "  ")]);
        assert_eq!(caller_identity(&h, "cg_usage_banner"), CallerIdentity::guest(None));
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().expect("addr");

        let h = headers(&[("x-forwarded-for", "203.0.113.5, 10.0.0.1"), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&h, Some(peer), true), "203.0.113.5");

        let h = headers(&[("x-forwarded-for", "garbage"), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&h, Some(peer), true), "198.51.100.2");

        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), "10.0.0.9");
        assert_eq!(client_ip(&HeaderMap::new(), None, true), "unknown");
    }

    #[test]
    fn test_client_ip_ignores_forwarded_headers_when_untrusted() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().expect("addr");
        let h = headers(&[("x-forwarded-for", "203.0.113.5"), ("x-real-ip", "198.51.100.2")]);

        assert_eq!(client_ip(&h, Some(peer), false), "10.0.0.9");
        assert_eq!(client_ip(&h, None, false), "unknown");
    }

    #[test]
    fn test_usage_cookie_attributes() {
        let cookie = usage_cookie("cg_usage_banner", "abc.def").expect("valid header");
        let cookie = cookie.to_str().expect("ascii");
        assert!(cookie.starts_with("cg_usage_banner=abc.def;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3456000"));
    }
}
