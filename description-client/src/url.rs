//! URL handling for description documents.
//!
//! Only numeric hosts are accepted; no name resolution is performed.

use std::net::{IpAddr, SocketAddr};

use crate::error::{DocError, Result};

const HTTP_SCHEME: &str = "http://";
const DEFAULT_HTTP_PORT: u16 = 80;

/// Socket address and request path extracted from a document URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedUrl {
    pub addr: SocketAddr,
    pub path: String,
}

/// Split an optional `http://` prefix (any case) from the rest of the URL
fn split_scheme(url: &str) -> (&str, &str) {
    match url.get(..HTTP_SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(HTTP_SCHEME) => {
            (prefix, &url[HTTP_SCHEME.len()..])
        }
        _ => ("", url),
    }
}

/// Parse a URL such as `http://192.168.1.20:49152/desc.xml` into address and path.
///
/// A missing port means port 80, a missing path means `/`.
pub(crate) fn resolve(url: &str) -> Result<ResolvedUrl> {
    let (_, rest) = split_scheme(url.trim());
    let (host, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };

    if host.is_empty() {
        return Err(DocError::Address(format!("no host segment in '{url}'")));
    }

    let addr = parse_host(host)
        .ok_or_else(|| DocError::Address(format!("host '{host}' is not a numeric address")))?;

    Ok(ResolvedUrl {
        addr,
        path: path.to_string(),
    })
}

fn parse_host(host: &str) -> Option<SocketAddr> {
    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Some(addr);
    }
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, DEFAULT_HTTP_PORT))
}

/// Strip the path from a URL, keeping the scheme prefix (if any) and the host segment.
pub(crate) fn derive_base(url: &str) -> Result<String> {
    let (scheme, rest) = split_scheme(url.trim());
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(DocError::Address(format!("no host segment in '{url}'")));
    }
    Ok(format!("{scheme}{host}"))
}

/// Join a base URL and a relative resource path.
///
/// A `/` is inserted only when neither side supplies one; when both do, one is dropped.
/// Absolute `http://` paths are returned unchanged.
pub fn join_url(base: &str, relative: &str) -> String {
    if !split_scheme(relative).0.is_empty() {
        return relative.to_string();
    }
    match (base.ends_with('/'), relative.starts_with('/')) {
        (true, true) => format!("{base}{}", &relative[1..]),
        (false, false) => format!("{base}/{relative}"),
        _ => format!("{base}{relative}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[rstest]
    #[case("http://192.168.1.20:49152/description.xml", "192.168.1.20:49152", "/description.xml")]
    #[case("HTTP://10.0.0.5:8080/a/b/c.xml", "10.0.0.5:8080", "/a/b/c.xml")]
    #[case("192.168.1.20:1400/xml/device_description.xml", "192.168.1.20:1400", "/xml/device_description.xml")]
    #[case("http://127.0.0.1:5000", "127.0.0.1:5000", "/")]
    fn test_resolve_numeric_urls(#[case] url: &str, #[case] addr: &str, #[case] path: &str) {
        let resolved = resolve(url).unwrap();
        assert_eq!(resolved.addr, addr.parse::<SocketAddr>().unwrap());
        assert_eq!(resolved.path, path);
    }

    #[test]
    fn test_resolve_defaults_port_80() {
        let resolved = resolve("http://192.168.1.7/desc.xml").unwrap();
        assert_eq!(
            resolved.addr,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 7)), 80)
        );
    }

    #[test]
    fn test_resolve_ipv6() {
        let resolved = resolve("http://[::1]:8000/desc.xml").unwrap();
        assert_eq!(resolved.addr, SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 8000));

        let resolved = resolve("http://[::1]/desc.xml").unwrap();
        assert_eq!(resolved.addr.port(), 80);
    }

    #[rstest]
    #[case("http://printer.local:80/desc.xml")]
    #[case("http:///desc.xml")]
    #[case("")]
    #[case("http://192.168.1.20:notaport/desc.xml")]
    fn test_resolve_rejects_non_numeric_hosts(#[case] url: &str) {
        assert!(matches!(resolve(url), Err(DocError::Address(_))));
    }

    #[rstest]
    #[case("http://192.168.1.20:49152/description.xml", "http://192.168.1.20:49152")]
    #[case("http://192.168.1.20:49152", "http://192.168.1.20:49152")]
    #[case("10.0.0.1:80/x/y", "10.0.0.1:80")]
    fn test_derive_base(#[case] url: &str, #[case] base: &str) {
        assert_eq!(derive_base(url).unwrap(), base);
    }

    #[test]
    fn test_derive_base_without_host() {
        assert!(derive_base("http:///only/path").is_err());
        assert!(derive_base("").is_err());
    }

    #[rstest]
    #[case("http://10.0.0.1:80", "scpd.xml", "http://10.0.0.1:80/scpd.xml")]
    #[case("http://10.0.0.1:80", "/scpd.xml", "http://10.0.0.1:80/scpd.xml")]
    #[case("http://10.0.0.1:80/", "scpd.xml", "http://10.0.0.1:80/scpd.xml")]
    #[case("http://10.0.0.1:80/", "/scpd.xml", "http://10.0.0.1:80/scpd.xml")]
    #[case("http://10.0.0.1:80", "http://10.0.0.2:81/x.xml", "http://10.0.0.2:81/x.xml")]
    fn test_join_url(#[case] base: &str, #[case] relative: &str, #[case] joined: &str) {
        assert_eq!(join_url(base, relative), joined);
    }
}
