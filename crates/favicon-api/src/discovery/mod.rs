//! Two-phase icon discovery
//!
//! Phase A probes `<origin>/favicon.ico` under the strict redirect policy and
//! commits to the response if its first 64 bytes sniff as a known icon kind.
//! Phase B fetches the landing page, scans it for `<link rel="icon">`
//! candidates, and resolves the winning href to an absolute URL. Phase C
//! fetches that URL and validates it the same way.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::errors::{AppResult, DiscoveryError};
use crate::fetch::{IconBody, IconFetcher, RedirectPolicy, body_reader, read_prefix};
use crate::sniff::{IconKind, sniff};
use crate::utils::url::authority_end;

/// A discovered icon: its final URL after redirects, the sniffed kind, and a
/// streaming body with the sniffed bytes re-prepended.
#[derive(Debug)]
pub struct ResolvedIcon {
    pub url: String,
    pub kind: IconKind,
    pub body: IconBody,
}

/// Discover the icon for `url`. The caller has already validated that `url`
/// carries a parseable authority.
pub async fn find_icon(fetcher: &IconFetcher, url: &str) -> AppResult<ResolvedIcon> {
    let origin_end = authority_end(url)?;
    let origin = &url[..origin_end];

    // Phase A: direct probe. A cross-host redirect stops the chase and the
    // body in hand is still sniffed; some sites answer the probe with the
    // icon bytes from a CDN edge.
    let response = fetcher
        .get(&format!("{origin}/favicon.ico"), RedirectPolicy::Strict)
        .await
        .map_err(|_| DiscoveryError::UnreachableServer)?;

    let final_url = response.url().to_string();
    let mut reader = body_reader(response);
    let (prefix, prefix_len) = read_prefix(&mut reader).await;
    if let Some(kind) = sniff(&prefix) {
        return Ok(ResolvedIcon {
            url: final_url,
            kind,
            body: IconBody::new(prefix, prefix_len, reader),
        });
    }

    // Phase B: landing-page scan.
    let response = fetcher
        .get(url, RedirectPolicy::Permissive)
        .await
        .map_err(|_| DiscoveryError::UnreachableServer)?;
    let landing_url = response.url().to_string();
    let html = response.text().await.unwrap_or_default();

    let scan = scan_landing_page(&html);
    let Some(candidate) = scan.candidate else {
        debug!(url, "no icon link in landing page");
        return Err(DiscoveryError::IconNotFound.into());
    };

    let icon_href = resolve_candidate(scan.base_href.as_deref(), &candidate, &landing_url)
        .ok_or(DiscoveryError::IconNotFound)?;

    // Phase C: fetch and validate the candidate.
    let response = fetcher
        .get(&icon_href, RedirectPolicy::Permissive)
        .await
        .map_err(|_| DiscoveryError::UnreachableServer)?;

    let final_url = response.url().to_string();
    let mut reader = body_reader(response);
    let (prefix, prefix_len) = read_prefix(&mut reader).await;
    let Some(kind) = sniff(&prefix) else {
        debug!(url, icon_href = %icon_href, "candidate body did not sniff as an icon");
        return Err(DiscoveryError::IconNotFound.into());
    };

    Ok(ResolvedIcon {
        url: final_url,
        kind,
        body: IconBody::new(prefix, prefix_len, reader),
    })
}

#[derive(Debug, Default, PartialEq)]
struct LandingScan {
    base_href: Option<String>,
    candidate: Option<String>,
}

/// Scan landing-page HTML for the best icon link.
///
/// The scan is a streaming event loop that stops once the `body` element is
/// reached; icon links live in the head. The reader runs leniently and any
/// markup error simply ends the scan, like end of stream.
fn scan_landing_page(html: &str) -> LandingScan {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut scan = LandingScan::default();
    let mut largest_size: u64 = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = tag_name(e);
                match name.as_str() {
                    "base" => {
                        if scan.base_href.is_none() {
                            let attrs = parse_attributes(e);
                            if let Some(href) = attrs.get("href") {
                                scan.base_href = Some(href.clone());
                            }
                        }
                    }
                    "body" => break,
                    "link" => {
                        let attrs = parse_attributes(e);
                        let rel = attrs.get("rel").map(String::as_str).unwrap_or("");
                        let href = attrs.get("href").map(String::as_str).unwrap_or("");
                        let type_attr = attrs.get("type").map(String::as_str).unwrap_or("");

                        if (rel != "icon" && rel != "shortcut icon")
                            || href.is_empty()
                            || type_attr == "image/svg+xml"
                            || href.ends_with(".svg")
                        {
                            continue;
                        }

                        match attrs.get("sizes").and_then(|s| parse_sizes(s)) {
                            Some(size) if size < largest_size => {}
                            Some(size) => {
                                largest_size = size;
                                scan.candidate = Some(href.to_string());
                            }
                            // size-unknown candidates stay eligible: latest wins
                            None => scan.candidate = Some(href.to_string()),
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref().eq_ignore_ascii_case(b"body") {
                    break;
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    scan
}

fn tag_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.name().as_ref()).to_ascii_lowercase()
}

/// Parse element attributes into a map with lowercased keys.
fn parse_attributes(element: &BytesStart) -> HashMap<String, String> {
    let mut attrs = HashMap::new();

    for attr in element.attributes().flatten() {
        if let (Ok(key), Ok(value)) = (
            std::str::from_utf8(attr.key.as_ref()),
            std::str::from_utf8(&attr.value),
        ) {
            attrs.insert(key.to_ascii_lowercase(), value.to_string());
        }
    }
    attrs
}

/// Parse a `sizes` attribute of the well-formed shape `NxM`, returning `N`.
/// Anything else (including `any`) is size-unknown.
fn parse_sizes(sizes: &str) -> Option<u64> {
    let sizes = sizes.trim();
    let (width, height) = sizes.split_once(['x', 'X'])?;
    if width.is_empty() || height.is_empty() || !height.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    width.parse().ok()
}

/// Resolve a candidate href to an absolute URL:
/// base href concatenation, then root-relative against the landing origin,
/// then verbatim absolute, then relative to the landing URL.
fn resolve_candidate(base_href: Option<&str>, candidate: &str, landing_url: &str) -> Option<String> {
    if let Some(base) = base_href {
        if !base.is_empty() {
            return Some(format!("{base}{candidate}"));
        }
    }

    if candidate.starts_with('/') {
        let end = authority_end(landing_url).ok()?;
        return Some(format!("{}{}", &landing_url[..end], candidate));
    }

    if authority_end(candidate).is_ok() {
        return Some(candidate.to_string());
    }

    Some(format!(
        "{}/{}",
        landing_url.trim_end_matches('/'),
        candidate
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_only_icon_link() {
        let scan = scan_landing_page(
            r#"<html><head><link rel="icon" href="/fav.png"></head><body></body></html>"#,
        );
        assert_eq!(scan.candidate.as_deref(), Some("/fav.png"));
    }

    #[test]
    fn largest_size_wins_regardless_of_order() {
        let scan = scan_landing_page(
            r#"<head>
                <link rel="icon" href="/small.png" sizes="32x32">
                <link rel="icon" href="/large.png" sizes="64x64">
            </head>"#,
        );
        assert_eq!(scan.candidate.as_deref(), Some("/large.png"));

        let scan = scan_landing_page(
            r#"<head>
                <link rel="icon" href="/large.png" sizes="64x64">
                <link rel="icon" href="/small.png" sizes="32x32">
            </head>"#,
        );
        assert_eq!(scan.candidate.as_deref(), Some("/large.png"));
    }

    #[test]
    fn unparseable_sizes_does_not_disqualify() {
        let scan = scan_landing_page(
            r#"<head><link rel="icon" href="/fav.png" sizes="any"></head>"#,
        );
        assert_eq!(scan.candidate.as_deref(), Some("/fav.png"));
    }

    #[test]
    fn svg_candidates_are_skipped() {
        let scan = scan_landing_page(
            r#"<head>
                <link rel="icon" type="image/svg+xml" href="/x.svg">
                <link rel="icon" href="/vector.svg">
            </head>"#,
        );
        assert_eq!(scan.candidate, None);
    }

    #[test]
    fn shortcut_icon_rel_is_accepted() {
        let scan = scan_landing_page(
            r#"<head><link rel="shortcut icon" href="favicon.ico"></head>"#,
        );
        assert_eq!(scan.candidate.as_deref(), Some("favicon.ico"));
    }

    #[test]
    fn other_rels_are_ignored() {
        let scan = scan_landing_page(
            r#"<head>
                <link rel="stylesheet" href="/style.css">
                <link rel="apple-touch-icon" href="/touch.png">
            </head>"#,
        );
        assert_eq!(scan.candidate, None);
    }

    #[test]
    fn first_base_href_wins() {
        let scan = scan_landing_page(
            r#"<head>
                <base href="https://cdn.example.com/assets">
                <base href="https://other.example.com/">
                <link rel="icon" href="/fav.png">
            </head>"#,
        );
        assert_eq!(
            scan.base_href.as_deref(),
            Some("https://cdn.example.com/assets")
        );
    }

    #[test]
    fn scan_stops_at_body() {
        let scan = scan_landing_page(
            r#"<head></head><body><link rel="icon" href="/late.png"></body>"#,
        );
        assert_eq!(scan.candidate, None);
    }

    #[test]
    fn tolerates_uppercase_markup() {
        let scan = scan_landing_page(
            r#"<HEAD><LINK REL="icon" HREF="/fav.png"/></HEAD>"#,
        );
        assert_eq!(scan.candidate.as_deref(), Some("/fav.png"));
    }

    #[test]
    fn sizes_parsing_contract() {
        assert_eq!(parse_sizes("32x32"), Some(32));
        assert_eq!(parse_sizes("100x100"), Some(100));
        assert_eq!(parse_sizes(" 64X64 "), Some(64));
        assert_eq!(parse_sizes("any"), None);
        assert_eq!(parse_sizes(""), None);
        assert_eq!(parse_sizes("x32"), None);
        assert_eq!(parse_sizes("32x"), None);
        assert_eq!(parse_sizes("32xbig"), None);
    }

    #[test]
    fn candidate_resolution_ladder() {
        // base href concatenation comes first
        assert_eq!(
            resolve_candidate(Some("https://cdn.example.com"), "/fav.png", "https://example.com/"),
            Some("https://cdn.example.com/fav.png".to_string())
        );
        // root-relative against the landing origin
        assert_eq!(
            resolve_candidate(None, "/static/fav.png", "https://example.com/about/"),
            Some("https://example.com/static/fav.png".to_string())
        );
        // absolute candidates pass through verbatim
        assert_eq!(
            resolve_candidate(None, "https://img.example.com/fav.ico", "https://example.com/"),
            Some("https://img.example.com/fav.ico".to_string())
        );
        // everything else is relative to the landing URL
        assert_eq!(
            resolve_candidate(None, "fav.png", "https://example.com/app/"),
            Some("https://example.com/app/fav.png".to_string())
        );
    }
}
