// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using a
// Rust struct and attributes. There are no subcommands: the tool does one
// thing, so the interface is one positional target plus a few flags.
// =============================================================================

use clap::Parser;

// The whole CLI of the submitter
//
// #[derive(Parser)] tells clap to automatically generate parsing code;
// the #[command(...)] attributes configure help/version behavior.
#[derive(Parser, Debug)]
#[command(
    name = "indexnow-submitter",
    version = "0.1.0",
    about = "Submit sitemap URLs to search engines via the IndexNow protocol",
    long_about = "indexnow-submitter discovers your site's sitemaps, verifies an IndexNow key \
                  for the host, and pushes every URL to all IndexNow-enabled search engines \
                  (Bing, Yandex, Seznam, Naver, Yep and the IndexNow hub) in batches."
)]
pub struct Cli {
    /// Site URL or sitemap URL to process
    ///
    /// A target ending in .xml is treated as a sitemap directly;
    /// anything else is treated as a site root and sitemaps are
    /// discovered via robots.txt and well-known paths.
    pub target: String,

    /// IndexNow API key (optional, looked up or generated if not provided)
    #[arg(long = "api-key")]
    pub api_key: Option<String>,

    /// Maximum number of concurrent requests (default: 3)
    #[arg(long = "max-concurrent", default_value_t = 3)]
    pub max_concurrent: usize,

    /// URLs per submission batch (default and protocol maximum: 5000)
    #[arg(long = "batch-size", default_value_t = 5000)]
    pub batch_size: usize,

    /// Disable all prompts; fail instead of asking the operator anything
    #[arg(long = "non-interactive")]
    pub non_interactive: bool,
}

impl Cli {
    /// True when the target names a sitemap document rather than a site root
    pub fn target_is_sitemap(&self) -> bool {
        self.target.to_ascii_lowercase().ends_with(".xml")
    }
}
