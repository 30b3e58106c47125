// src/extract/xml.rs
// =============================================================================
// This module parses sitemap XML into a list of absolute URLs.
//
// Key functionality:
// - Detects whether a document is a URL set or a sitemap index
// - Extracts <url><loc> entries plus hreflang alternate links
// - Tolerates garbage before the <?xml declaration and after the closing tag
// - Falls back to lenient regex scanning when strict parsing fails
//
// Real-world sitemaps are messy: misconfigured servers prepend PHP warnings,
// append tracking pixels, or serve outright broken XML. Extraction therefore
// never fails fatally - malformed input yields a partial (possibly empty)
// list and a warning flag, and the caller decides what to do with it.
// =============================================================================

use log::warn;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

// The outcome of extracting one sitemap document
//
// When `is_index` is true the document was a sitemap index and
// `child_locations` holds the referenced sitemaps; `urls` is empty.
// When the strict parser gave up, `used_fallback` is true and the result
// must be treated as a flat URL list only (indexes are not detectable
// by the fallback scanner).
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Page URLs found in a URL set document
    pub urls: Vec<String>,
    /// True when the document's root element was <sitemapindex>
    pub is_index: bool,
    /// Child sitemap locations found in a sitemap index
    pub child_locations: Vec<String>,
    /// True when strict parsing failed and the regex fallback produced the result
    pub used_fallback: bool,
}

// Extracts URLs from one sitemap or sitemap-index document
//
// Parameters:
//   content: the raw XML body as fetched
//   base_url: the URL the document was fetched from (for resolving
//             relative <loc> entries)
//
// The returned lists are deduplicated; order follows first appearance.
pub fn extract_urls(content: &str, base_url: &str) -> Extraction {
    // Tolerate trailing/leading garbage from misconfigured servers
    let cleaned = trim_document(content);

    match parse_strict(cleaned, base_url) {
        Some(extraction) => extraction,
        None => {
            warn!("strict XML parse failed for {}, using lenient fallback", base_url);
            let urls = scan_lenient(cleaned);
            Extraction {
                urls,
                is_index: false,
                child_locations: Vec::new(),
                used_fallback: true,
            }
        }
    }
}

// Strips content preceding the first <?xml declaration and content
// following the closing </sitemapindex> or </urlset> tag.
//
// Documents without an <?xml declaration are left alone on that side;
// likewise when no recognized closing tag is present.
fn trim_document(content: &str) -> &str {
    let start = content.find("<?xml").unwrap_or(0);
    let trimmed = &content[start..];

    let end = ["</sitemapindex>", "</urlset>"]
        .iter()
        .filter_map(|tag| trimmed.rfind(tag).map(|pos| pos + tag.len()))
        .max();

    match end {
        Some(end) => &trimmed[..end],
        None => trimmed,
    }
}

// Attempts a strict streaming parse of the document
//
// Returns None when quick-xml reports a structural error, which sends the
// caller to the lenient fallback path. Namespaces vary between generators
// (the sitemap 0.9 namespace, xhtml for alternates), so we match on local
// element names only.
fn parse_strict(content: &str, base_url: &str) -> Option<Extraction> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut is_index = false;
    let mut saw_root = false;

    // Set while positioned inside a <loc> element, so the next text
    // event is a location value
    let mut in_loc = false;

    let mut urls = Vec::new();
    let mut children = Vec::new();
    let mut seen = HashSet::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();

                if !saw_root {
                    saw_root = true;
                    is_index = name == b"sitemapindex";
                }

                match name {
                    b"loc" => in_loc = true,
                    // hreflang alternates carry their URL in an href
                    // attribute; they only belong to URL set documents
                    b"link" if !is_index => {
                        if let Some(href) = alternate_href(&e) {
                            push_unique(&mut urls, &mut seen, href);
                        }
                    }
                    _ => {}
                }
            }
            // <link .../> is usually self-closing, which arrives as Empty
            Ok(Event::Empty(e)) => {
                if !is_index && e.local_name().as_ref() == b"link" {
                    if let Some(href) = alternate_href(&e) {
                        push_unique(&mut urls, &mut seen, href);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if in_loc {
                    if let Ok(text) = t.unescape() {
                        let loc = text.trim().to_string();
                        if is_index {
                            if let Some(resolved) = resolve_location(&loc, base_url) {
                                push_unique(&mut children, &mut seen, resolved);
                            }
                        } else if is_absolute_http(&loc) {
                            push_unique(&mut urls, &mut seen, loc);
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"loc" {
                    in_loc = false;
                }
            }
            Ok(Event::Eof) => break,
            // Structural error: hand control to the lenient fallback
            Err(_) => return None,
            Ok(_) => {}
        }
    }

    Some(Extraction {
        urls,
        is_index,
        child_locations: children,
        used_fallback: false,
    })
}

// Pulls the href attribute out of a <link rel="alternate"> element
fn alternate_href(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    let mut rel_alternate = false;
    let mut href = None;

    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"rel" => {
                if let Ok(value) = attr.unescape_value() {
                    rel_alternate = value.as_ref() == "alternate";
                }
            }
            b"href" => {
                if let Ok(value) = attr.unescape_value() {
                    href = Some(value.into_owned());
                }
            }
            _ => {}
        }
    }

    match href {
        Some(href) if rel_alternate && is_absolute_http(&href) => Some(href),
        _ => None,
    }
}

// Lenient extraction for documents the strict parser rejected
//
// Two independent scans: every <loc>...</loc> text content and every
// href="..." attribute value. The union of absolute-URL-shaped matches is
// returned as a flat list - this path cannot tell an index from a URL set.
fn scan_lenient(content: &str) -> Vec<String> {
    // These patterns are constant and known to be valid, so unwrap is fine
    let loc_re = Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").unwrap();
    let href_re = Regex::new(r#"href\s*=\s*"([^"]+)""#).unwrap();

    let mut urls = Vec::new();
    let mut seen = HashSet::new();

    for caps in loc_re.captures_iter(content) {
        let candidate = caps[1].trim().to_string();
        if is_absolute_http(&candidate) {
            push_unique(&mut urls, &mut seen, candidate);
        }
    }
    for caps in href_re.captures_iter(content) {
        let candidate = caps[1].trim().to_string();
        if is_absolute_http(&candidate) {
            push_unique(&mut urls, &mut seen, candidate);
        }
    }

    urls
}

// Resolves a child sitemap location, which may be relative to the
// index document that referenced it
fn resolve_location(loc: &str, base_url: &str) -> Option<String> {
    if is_absolute_http(loc) {
        return Some(loc.to_string());
    }
    let base = Url::parse(base_url).ok()?;
    let resolved = base.join(loc).ok()?;
    if is_absolute_http(resolved.as_str()) {
        Some(resolved.to_string())
    } else {
        None
    }
}

// Only http/https URLs qualify as submittable site URLs
fn is_absolute_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

// Appends a URL only if we haven't collected it yet (set semantics,
// first-appearance order)
fn push_unique(list: &mut Vec<String>, seen: &mut HashSet<String>, url: String) {
    if seen.insert(url.clone()) {
        list.push(url);
    }
}
