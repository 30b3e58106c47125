// src/extract/mod.rs
// =============================================================================
// This module turns one XML document (a sitemap or a sitemap index) into a
// flat list of absolute URLs.
//
// Submodules:
// - xml: Strict quick-xml parsing with a lenient regex fallback
//
// This file (mod.rs) is the module root - it exports the public API that
// other parts of our application can use.
// =============================================================================

mod xml;

// Re-export public items from the submodule
// This lets users write `extract::extract_urls()` instead of
// `extract::xml::extract_urls()`
pub use xml::{extract_urls, Extraction};
