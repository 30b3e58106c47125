// src/sitemap/mod.rs
// =============================================================================
// This module handles sitemap discovery and resolution.
//
// Features:
// - Discovers sitemap locations from robots.txt and well-known paths
// - Resolves a sitemap (or a whole index of sitemaps) into one flat URL list
// - Tracks visited locations so cyclic indexes cannot loop forever
//
// Why both discovery and resolution?
// - Operators hand us either a site root ("https://example.com") or a
//   concrete sitemap URL; discovery turns the former into the latter
// =============================================================================

mod resolve;

// Re-export the main entry points
pub use resolve::{discover_sitemaps, resolve_sitemap};
