// src/sitemap/resolve.rs
// =============================================================================
// This module finds sitemaps for a site and flattens them into URL lists.
//
// How discovery works:
// 1. Fetch {root}/robots.txt and collect every "Sitemap:" directive
// 2. Probe a fixed list of conventional sitemap paths
// 3. Keep a candidate only if the probe answered 200 with an XML-ish body
//
// How resolution works:
// 1. Fetch the sitemap and run it through the URL extractor
// 2. If it was an index, queue up every child sitemap and repeat
// 3. Concatenate (and dedupe) everything into one flat list
//
// A sitemap index that references itself, or two indexes that reference
// each other, would recurse forever - so resolution keeps a set of already
// visited locations and refuses to fetch one twice.
// =============================================================================

use anyhow::{anyhow, Result};
use log::{info, warn};
use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use url::Url;

use crate::extract::extract_urls;

// Conventional sitemap locations, probed in this order after robots.txt
const WELL_KNOWN_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap-index.xml",
    "/sitemaps/sitemap.xml",
    "/wp-sitemap.xml",
    "/sitemap/sitemap.xml",
];

// Discovers candidate sitemap locations for a site root
//
// Parameters:
//   client: reqwest HTTP client (shared for the whole run)
//   site_root: the site's root URL (e.g., "https://example.com")
//
// Returns: deduplicated candidate URLs in discovery order
//   (robots.txt declarations first, then well-known path probes)
pub async fn discover_sitemaps(client: &Client, site_root: &str) -> Result<Vec<String>> {
    let root = Url::parse(site_root)
        .map_err(|e| anyhow!("Invalid site URL '{}': {}", site_root, e))?;

    let mut candidates = Vec::new();
    let mut seen = HashSet::new();

    // Step 1: robots.txt "Sitemap:" directives
    let robots_url = root
        .join("/robots.txt")
        .map_err(|e| anyhow!("Cannot build robots.txt URL: {}", e))?;

    match fetch_text(client, robots_url.as_str()).await {
        Ok(body) => {
            for declared in sitemap_directives(&body, &root) {
                if seen.insert(declared.clone()) {
                    info!("robots.txt declares sitemap: {}", declared);
                    candidates.push(declared);
                }
            }
        }
        Err(e) => {
            // Many sites have no robots.txt; that's not an error for us
            warn!("could not fetch {}: {}", robots_url, e);
        }
    }

    // Step 2: probe the conventional paths
    for path in WELL_KNOWN_PATHS {
        let probe_url = match root.join(path) {
            Ok(url) => url,
            Err(_) => continue,
        };
        if seen.contains(probe_url.as_str()) {
            continue;
        }
        if probe_is_sitemap(client, probe_url.as_str()).await {
            info!("found sitemap at well-known path: {}", probe_url);
            seen.insert(probe_url.to_string());
            candidates.push(probe_url.to_string());
        }
    }

    Ok(candidates)
}

// Parses robots.txt lines for "Sitemap:" directives (case-insensitive)
//
// Declared locations may be relative; they are resolved against the root.
fn sitemap_directives(robots_body: &str, root: &Url) -> Vec<String> {
    let mut found = Vec::new();

    for line in robots_body.lines() {
        let line = line.trim();
        let lowered = line.to_ascii_lowercase();
        if let Some(rest) = lowered.strip_prefix("sitemap:") {
            // Take the value from the original line to preserve URL casing
            let value = line[line.len() - rest.len()..].trim();
            if value.is_empty() {
                continue;
            }
            match root.join(value) {
                Ok(resolved) => found.push(resolved.to_string()),
                Err(_) => warn!("ignoring unparseable Sitemap directive: {}", value),
            }
        }
    }

    found
}

// Checks whether a probe URL answers 200 with an XML-flavored content type
async fn probe_is_sitemap(client: &Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(response) => {
            if response.status() != reqwest::StatusCode::OK {
                return false;
            }
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|ct| ct.contains("xml"))
                .unwrap_or(false)
        }
        Err(_) => false,
    }
}

// The fetch seam for resolution: production goes over HTTP, tests
// substitute canned documents so the traversal logic runs hermetically
trait Fetch {
    async fn fetch(&self, url: &str) -> Result<String>;
}

struct HttpFetch<'a> {
    client: &'a Client,
}

impl Fetch for HttpFetch<'_> {
    async fn fetch(&self, url: &str) -> Result<String> {
        fetch_text(self.client, url).await
    }
}

// Resolves a sitemap location into a flat, deduplicated URL list
//
// Handles both plain URL sets and sitemap indexes. Index children are
// resolved breadth-first; each distinct location is fetched at most once
// per call, so cyclic or self-referencing indexes terminate.
//
// A failed fetch of one location contributes nothing but does not abort
// resolution of its siblings.
pub async fn resolve_sitemap(client: &Client, sitemap_url: &str) -> Vec<String> {
    resolve_with(&HttpFetch { client }, sitemap_url).await
}

// The actual traversal, generic over how documents are fetched
async fn resolve_with<F: Fetch>(fetcher: &F, sitemap_url: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut seen_urls = HashSet::new();

    // Breadth-first over the index tree, same shape as a polite crawler
    let mut pending = VecDeque::new();
    pending.push_back(sitemap_url.to_string());
    let mut visited = HashSet::new();

    while let Some(location) = pending.pop_front() {
        // Refuse to re-resolve a location (cycle guard)
        if !visited.insert(location.clone()) {
            warn!("skipping already-resolved sitemap location: {}", location);
            continue;
        }

        let body = match fetcher.fetch(&location).await {
            Ok(body) => body,
            Err(e) => {
                warn!("failed to fetch sitemap {}: {}", location, e);
                continue;
            }
        };

        let extraction = extract_urls(&body, &location);

        if extraction.is_index {
            info!(
                "{} is a sitemap index with {} children",
                location,
                extraction.child_locations.len()
            );
            for child in extraction.child_locations {
                if !visited.contains(&child) {
                    pending.push_back(child);
                }
            }
        } else {
            info!("extracted {} URLs from {}", extraction.urls.len(), location);
            for url in extraction.urls {
                if seen_urls.insert(url.clone()) {
                    urls.push(url);
                }
            }
        }
    }

    urls
}

// Fetches a URL and returns its body, treating any non-200 as an error
async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(anyhow!("HTTP {}", response.status()));
    }

    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    // Serves canned documents and counts how often each location is
    // fetched; locations without a document answer with an error
    struct MapFetch {
        documents: HashMap<String, String>,
        fetched: RefCell<HashMap<String, usize>>,
    }

    impl MapFetch {
        fn new(documents: &[(&str, &str)]) -> Self {
            MapFetch {
                documents: documents
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                fetched: RefCell::new(HashMap::new()),
            }
        }

        fn fetch_count(&self, url: &str) -> usize {
            self.fetched.borrow().get(url).copied().unwrap_or(0)
        }
    }

    impl Fetch for MapFetch {
        async fn fetch(&self, url: &str) -> Result<String> {
            *self.fetched.borrow_mut().entry(url.to_string()).or_insert(0) += 1;
            self.documents
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("HTTP 404"))
        }
    }

    fn url_set(urls: &[String]) -> String {
        let entries: String = urls
            .iter()
            .map(|u| format!("<url><loc>{}</loc></url>", u))
            .collect();
        format!(r#"<?xml version="1.0"?><urlset>{}</urlset>"#, entries)
    }

    fn index_of(children: &[&str]) -> String {
        let entries: String = children
            .iter()
            .map(|c| format!("<sitemap><loc>{}</loc></sitemap>", c))
            .collect();
        format!(r#"<?xml version="1.0"?><sitemapindex>{}</sitemapindex>"#, entries)
    }

    #[tokio::test]
    async fn test_resolve_plain_url_set() {
        let urls: Vec<String> = (0..3).map(|i| format!("https://example.com/{}", i)).collect();
        let fetcher = MapFetch::new(&[("https://example.com/sitemap.xml", &url_set(&urls))]);

        let resolved = resolve_with(&fetcher, "https://example.com/sitemap.xml").await;
        assert_eq!(resolved, urls);
    }

    #[tokio::test]
    async fn test_resolve_index_unions_children() {
        // An index over two children of 150 and 25 URLs (no overlap)
        // resolves to all 175
        let posts: Vec<String> = (0..150).map(|i| format!("https://example.com/post/{}", i)).collect();
        let pages: Vec<String> = (0..25).map(|i| format!("https://example.com/page/{}", i)).collect();
        let fetcher = MapFetch::new(&[
            (
                "https://example.com/sitemap_index.xml",
                &index_of(&[
                    "https://example.com/sitemap-posts.xml",
                    "https://example.com/sitemap-pages.xml",
                ]),
            ),
            ("https://example.com/sitemap-posts.xml", &url_set(&posts)),
            ("https://example.com/sitemap-pages.xml", &url_set(&pages)),
        ]);

        let resolved = resolve_with(&fetcher, "https://example.com/sitemap_index.xml").await;
        assert_eq!(resolved.len(), 175);
    }

    #[tokio::test]
    async fn test_resolve_deduplicates_across_children() {
        let shared = "https://example.com/shared".to_string();
        let a = vec![shared.clone(), "https://example.com/a".to_string()];
        let b = vec![shared.clone(), "https://example.com/b".to_string()];
        let fetcher = MapFetch::new(&[
            (
                "https://example.com/sitemap_index.xml",
                &index_of(&[
                    "https://example.com/a.xml",
                    "https://example.com/b.xml",
                ]),
            ),
            ("https://example.com/a.xml", &url_set(&a)),
            ("https://example.com/b.xml", &url_set(&b)),
        ]);

        let resolved = resolve_with(&fetcher, "https://example.com/sitemap_index.xml").await;
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved.iter().filter(|u| **u == shared).count(), 1);
    }

    #[tokio::test]
    async fn test_self_referencing_index_terminates() {
        // The index lists itself as a child; the visited set must stop the
        // loop after a single fetch of each location
        let fetcher = MapFetch::new(&[
            (
                "https://example.com/sitemap_index.xml",
                &index_of(&[
                    "https://example.com/sitemap_index.xml",
                    "https://example.com/leaf.xml",
                ]),
            ),
            (
                "https://example.com/leaf.xml",
                &url_set(&["https://example.com/only".to_string()]),
            ),
        ]);

        let resolved = resolve_with(&fetcher, "https://example.com/sitemap_index.xml").await;
        assert_eq!(resolved, vec!["https://example.com/only"]);
        assert_eq!(fetcher.fetch_count("https://example.com/sitemap_index.xml"), 1);
        assert_eq!(fetcher.fetch_count("https://example.com/leaf.xml"), 1);
    }

    #[tokio::test]
    async fn test_mutually_referencing_indexes_terminate() {
        let fetcher = MapFetch::new(&[
            (
                "https://example.com/a.xml",
                &index_of(&["https://example.com/b.xml"]),
            ),
            (
                "https://example.com/b.xml",
                &index_of(&["https://example.com/a.xml"]),
            ),
        ]);

        let resolved = resolve_with(&fetcher, "https://example.com/a.xml").await;
        assert!(resolved.is_empty());
        assert_eq!(fetcher.fetch_count("https://example.com/a.xml"), 1);
        assert_eq!(fetcher.fetch_count("https://example.com/b.xml"), 1);
    }

    #[tokio::test]
    async fn test_failed_child_does_not_abort_siblings() {
        // broken.xml has no document, so fetching it errors; the other
        // child still contributes its URLs
        let ok: Vec<String> = (0..4).map(|i| format!("https://example.com/ok/{}", i)).collect();
        let fetcher = MapFetch::new(&[
            (
                "https://example.com/sitemap_index.xml",
                &index_of(&[
                    "https://example.com/broken.xml",
                    "https://example.com/ok.xml",
                ]),
            ),
            ("https://example.com/ok.xml", &url_set(&ok)),
        ]);

        let resolved = resolve_with(&fetcher, "https://example.com/sitemap_index.xml").await;
        assert_eq!(resolved, ok);
        assert_eq!(fetcher.fetch_count("https://example.com/broken.xml"), 1);
    }

    #[test]
    fn test_sitemap_directive_parsing() {
        let root = Url::parse("https://example.com").unwrap();
        let robots = "User-agent: *\nDisallow: /admin\nSitemap: https://example.com/sitemap_index.xml\n";
        let found = sitemap_directives(robots, &root);
        assert_eq!(found, vec!["https://example.com/sitemap_index.xml"]);
    }

    #[test]
    fn test_sitemap_directive_case_insensitive() {
        let root = Url::parse("https://example.com").unwrap();
        let robots = "SITEMAP: https://example.com/a.xml\nsitemap:https://example.com/b.xml";
        let found = sitemap_directives(robots, &root);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_sitemap_directive_relative() {
        let root = Url::parse("https://example.com").unwrap();
        let robots = "Sitemap: /sitemap.xml";
        let found = sitemap_directives(robots, &root);
        assert_eq!(found, vec!["https://example.com/sitemap.xml"]);
    }

    #[test]
    fn test_sitemap_directive_preserves_url_case() {
        let root = Url::parse("https://example.com").unwrap();
        let robots = "Sitemap: https://example.com/SiteMap.XML";
        let found = sitemap_directives(robots, &root);
        assert_eq!(found, vec!["https://example.com/SiteMap.XML"]);
    }

    #[test]
    fn test_sitemap_directive_ignores_other_lines() {
        let root = Url::parse("https://example.com").unwrap();
        let robots = "User-agent: *\nAllow: /\nCrawl-delay: 10";
        assert!(sitemap_directives(robots, &root).is_empty());
    }
}
