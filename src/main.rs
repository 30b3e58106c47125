// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Resolve the target into a flat list of URLs (discovering sitemaps
//    first when the operator gave us a site root)
// 3. Acquire and verify the IndexNow key for the host
// 4. Submit everything in batches and print the final report
// 5. Exit with proper code (0 = run completed, 1 = no sitemap / no key,
//    2 = unexpected error)
//
// A completed run exits 0 even when some engines rejected some batches -
// partial failure is normal for a multi-engine protocol, and the report
// is where that truth lives.
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;      // src/cli.rs - command-line parsing
mod extract;  // src/extract/ - sitemap XML to URL list
mod key;      // src/key/ - IndexNow key acquisition and cache
mod report;   // src/report.rs - run statistics and the final summary
mod sitemap;  // src/sitemap/ - sitemap discovery and resolution
mod submit;   // src/submit/ - batched multi-engine submission

use anyhow::{anyhow, Result};
use clap::Parser;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use cli::Cli;
use key::{ConsolePrompter, FileKeyStore, KeyOutcome, Prompter};
use submit::SubmitConfig;

// Every HTTP call in the run carries this bounded timeout so one
// unresponsive endpoint cannot stall the run indefinitely
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// The #[tokio::main] attribute creates a tokio runtime and runs our async
// code inside it
#[tokio::main]
async fn main() {
    // RUST_LOG controls verbosity (info by default is a sensible choice:
    // RUST_LOG=info ./indexnow-submitter ...)
    env_logger::init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // An unexpected error occurred; print it and exit with code 2
            eprintln!("Error: {}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// The main application logic
//
// Returns:
//   Ok(0) = run completed (partial engine failures included)
//   Ok(1) = no sitemap could be resolved, or no valid key was available
//   Err   = unexpected error (invalid target URL, broken key cache, ...)
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    // The target must be an absolute http(s) URL; its host is the host we
    // submit for
    let target = Url::parse(&cli.target)
        .map_err(|e| anyhow!("Invalid target URL '{}': {}", cli.target, e))?;
    if target.scheme() != "http" && target.scheme() != "https" {
        return Err(anyhow!("Target must be an http(s) URL: {}", cli.target));
    }
    let host = target
        .host_str()
        .ok_or_else(|| anyhow!("Target URL has no host: {}", cli.target))?
        .to_string();

    // One client for the whole run (connection pooling + shared timeout)
    let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;

    // Step 1: turn the target into a flat URL list
    let urls = resolve_target(&client, &cli).await?;
    if urls.is_empty() {
        eprintln!("❌ No URLs could be resolved from any sitemap");
        return Ok(1);
    }
    println!("🔗 Resolved {} unique URL(s) for {}", urls.len(), host);

    // Step 2: acquire the IndexNow key for the host
    let mut store = FileKeyStore::open_default()?;
    let mut console = ConsolePrompter;
    let prompter: Option<&mut dyn Prompter> = if cli.non_interactive {
        None
    } else {
        Some(&mut console)
    };

    let key = match key::acquire_key(&client, &host, cli.api_key.as_deref(), &mut store, prompter)
        .await?
    {
        KeyOutcome::Ready(key) => key,
        KeyOutcome::Aborted(reason) => {
            // No valid key means no submissions at all for this host
            eprintln!("❌ No valid IndexNow key: {}", reason);
            return Ok(1);
        }
    };

    // Step 3: submit everything and report
    println!("🚀 Submitting {} URL(s) as {}", urls.len(), host);
    let config = SubmitConfig {
        batch_size: cli.batch_size,
        max_concurrent: cli.max_concurrent,
    };
    let stats = submit::submit(&client, &urls, &host, &key, &config).await;

    report::print_report(&stats);
    Ok(0)
}

// Resolves the CLI target into a deduplicated flat URL list
//
// A target ending in .xml is resolved as a sitemap directly; otherwise we
// discover candidate sitemaps for the site root and resolve each of them,
// unioning the results.
async fn resolve_target(client: &Client, cli: &Cli) -> Result<Vec<String>> {
    if cli.target_is_sitemap() {
        println!("🗺️  Resolving sitemap: {}", cli.target);
        return Ok(sitemap::resolve_sitemap(client, &cli.target).await);
    }

    println!("🔍 Discovering sitemaps for {}", cli.target);
    let candidates = sitemap::discover_sitemaps(client, &cli.target).await?;
    if candidates.is_empty() {
        eprintln!("❌ No sitemaps found via robots.txt or well-known paths");
        return Ok(Vec::new());
    }

    println!("📄 Found {} candidate sitemap(s):", candidates.len());
    for candidate in &candidates {
        println!("   {}", candidate);
    }

    // Union of all candidates, first appearance wins
    let mut urls = Vec::new();
    let mut seen = HashSet::new();
    for candidate in &candidates {
        for url in sitemap::resolve_sitemap(client, candidate).await {
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }
    }

    Ok(urls)
}
