//! Client address derivation from proxy headers.
//!
//! Order: `Forwarded` (`for=`), first `X-Forwarded-For` entry, `X-Real-Ip`,
//! then the transport peer address. A forwarding header that is redacted
//! or looks sensitive is never consulted.

use crate::config::RedactionPolicy;
use crate::core::Headers;
use crate::redact::is_sensitive_header;

const FORWARDED: &str = "forwarded";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Best known client address, without port.
pub fn client_address(
    headers: &Headers,
    remote_address: Option<&str>,
    policy: &RedactionPolicy,
) -> Option<String> {
    let usable = |name: &str| !policy.redacts_header(name) && !is_sensitive_header(name);
    let replacement = policy.replacement.as_str();

    if usable(FORWARDED) {
        if let Some(addr) = headers
            .get_first(FORWARDED)
            .and_then(forwarded_for)
            .and_then(|c| clean(c, replacement))
        {
            return Some(addr);
        }
    }

    if usable(X_FORWARDED_FOR) {
        if let Some(addr) = headers
            .get_first(X_FORWARDED_FOR)
            .and_then(|v| v.split(',').next())
            .and_then(|c| clean(c, replacement))
        {
            return Some(addr);
        }
    }

    if usable(X_REAL_IP) {
        if let Some(addr) = headers
            .get_first(X_REAL_IP)
            .and_then(|c| clean(c, replacement))
        {
            return Some(addr);
        }
    }

    remote_address.and_then(|c| clean(c, replacement))
}

/// `for=` parameter of the first `Forwarded` element.
fn forwarded_for(value: &str) -> Option<&str> {
    let first = value.split(',').next()?;
    first.split(';').find_map(|pair| {
        let (name, val) = pair.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("for") {
            Some(val.trim())
        } else {
            None
        }
    })
}

fn clean(candidate: &str, replacement: &str) -> Option<String> {
    let raw = candidate.trim().trim_matches('"').trim();
    if rejected(raw, replacement) {
        return None;
    }

    let host = if let Some(rest) = raw.strip_prefix('[') {
        // [v6] or [v6]:port
        rest.split_once(']').map_or(rest, |(inner, _)| inner)
    } else if raw.matches(':').count() == 1 {
        raw.split_once(':').map_or(raw, |(host, _)| host)
    } else {
        raw
    };

    let host = host.trim();
    if rejected(host, replacement) {
        None
    } else {
        Some(host.to_string())
    }
}

#[inline]
fn rejected(candidate: &str, replacement: &str) -> bool {
    candidate.is_empty() || candidate == replacement || candidate.eq_ignore_ascii_case("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedactionOverride;

    fn policy() -> RedactionPolicy {
        RedactionPolicy::default()
    }

    #[test]
    fn test_forwarded_wins() {
        let headers = Headers::new()
            .with("Forwarded", "for=192.0.2.60;proto=http;by=203.0.113.43, for=198.51.100.17")
            .with("X-Forwarded-For", "10.0.0.1")
            .with("X-Real-Ip", "10.0.0.2");
        assert_eq!(
            client_address(&headers, Some("127.0.0.1:5000"), &policy()).as_deref(),
            Some("192.0.2.60")
        );
    }

    #[test]
    fn test_forwarded_quoted_ipv6() {
        let headers = Headers::new().with("Forwarded", "For=\"[2001:db8:cafe::17]:4711\"");
        assert_eq!(
            client_address(&headers, None, &policy()).as_deref(),
            Some("2001:db8:cafe::17")
        );
    }

    #[test]
    fn test_fallback_order() {
        let xff = Headers::new()
            .with("X-Forwarded-For", "203.0.113.9:8080, 10.0.0.1")
            .with("X-Real-Ip", "10.0.0.2");
        assert_eq!(client_address(&xff, None, &policy()).as_deref(), Some("203.0.113.9"));

        let real = Headers::new().with("X-Real-Ip", "10.0.0.2");
        assert_eq!(client_address(&real, None, &policy()).as_deref(), Some("10.0.0.2"));

        assert_eq!(
            client_address(&Headers::new(), Some("127.0.0.1:5000"), &policy()).as_deref(),
            Some("127.0.0.1")
        );
        assert_eq!(client_address(&Headers::new(), None, &policy()), None);
    }

    #[test]
    fn test_rejects_unknown_and_replacement() {
        let headers = Headers::new()
            .with("Forwarded", "for=unknown")
            .with("X-Forwarded-For", "[REDACTED]")
            .with("X-Real-Ip", "10.0.0.2");
        assert_eq!(client_address(&headers, None, &policy()).as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn test_bare_ipv6_left_intact() {
        assert_eq!(
            client_address(&Headers::new(), Some("2001:db8::1"), &policy()).as_deref(),
            Some("2001:db8::1")
        );
        assert_eq!(
            client_address(&Headers::new(), Some("[::1]:443"), &policy()).as_deref(),
            Some("::1")
        );
    }

    #[test]
    fn test_redacted_forwarding_header_skipped() {
        let policy = policy()
            .merge(&RedactionOverride::default().headers(["x-forwarded-for"]))
            .unwrap();
        let headers = Headers::new().with("X-Forwarded-For", "203.0.113.9");
        assert_eq!(
            client_address(&headers, Some("10.1.1.1"), &policy).as_deref(),
            Some("10.1.1.1")
        );
    }
}
