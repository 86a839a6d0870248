//! URL authority parsing
//!
//! A conservative byte scan that locates the `scheme://host[:port]` prefix of
//! a URL without pulling in a full URL parser. Userinfo (`user:password@`) is
//! not supported; it has been deprecated for decades and only ever worked by
//! accident.

use crate::errors::{AppError, AppResult};

/// Returns the byte offset just past the authority of `url`, so that
/// `&url[..offset]` is the origin (`scheme://host[:port]`).
///
/// The scheme must be non-empty, start with an ASCII letter, consist of
/// alphanumerics or `-._+`, and be followed by `://`. The authority then runs
/// until the first `/`, `?`, or `#`.
pub fn authority_end(url: &str) -> AppResult<usize> {
    let bytes = url.as_bytes();
    let mut scheme_end = 0;

    while scheme_end < bytes.len() {
        let c = bytes[scheme_end];
        if c.is_ascii_alphanumeric() || matches!(c, b'-' | b'.' | b'_' | b'+') {
            scheme_end += 1;
        } else {
            break;
        }
    }

    if scheme_end == 0
        || scheme_end + 3 > bytes.len()
        || !bytes[0].is_ascii_alphabetic()
        || &bytes[scheme_end..scheme_end + 3] != b"://"
    {
        return Err(AppError::validation("url field must be a valid url"));
    }

    let mut pos = scheme_end + 3;
    while pos < bytes.len() {
        if matches!(bytes[pos], b'/' | b'?' | b'#') {
            break;
        }
        pos += 1;
    }

    Ok(pos)
}

/// The origin slice of `url`: `scheme://host[:port]`.
pub fn origin(url: &str) -> AppResult<&str> {
    Ok(&url[..authority_end(url)?])
}

/// The lowercased host of `url`, with any `:port` suffix removed.
pub fn host(url: &str) -> AppResult<String> {
    let end = authority_end(url)?;
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let authority = &url[scheme_end..end];
    let host = authority.split(':').next().unwrap_or(authority);
    Ok(host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_round_trips() {
        for url in [
            "https://example.com",
            "https://example.com/",
            "http://example.com:8080/path?q=1#frag",
            "git+ssh://host.example",
            "https://EXAMPLE.com/favicon.ico",
        ] {
            let end = authority_end(url).unwrap();
            assert_eq!(authority_end(&url[..end]).unwrap(), end, "{url}");
        }
    }

    #[test]
    fn origin_stops_at_path_query_fragment() {
        assert_eq!(origin("https://example.com/a/b").unwrap(), "https://example.com");
        assert_eq!(origin("https://example.com?x=1").unwrap(), "https://example.com");
        assert_eq!(origin("https://example.com#top").unwrap(), "https://example.com");
        assert_eq!(origin("https://example.com:8443/x").unwrap(), "https://example.com:8443");
    }

    #[test]
    fn rejects_malformed_schemes() {
        assert!(authority_end("").is_err());
        assert!(authority_end("example.com").is_err());
        assert!(authority_end("://example.com").is_err());
        assert!(authority_end("1https://example.com").is_err());
        assert!(authority_end("https:/example.com").is_err());
        assert!(authority_end("https").is_err());
    }

    #[test]
    fn host_lowercases_and_strips_port() {
        assert_eq!(host("https://Example.COM/x").unwrap(), "example.com");
        assert_eq!(host("https://example.com:8080/x").unwrap(), "example.com");
        assert_eq!(host("https://www.example.com").unwrap(), "www.example.com");
    }
}
