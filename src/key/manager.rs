// src/key/manager.rs
// =============================================================================
// This module acquires the IndexNow key for a host.
//
// The acquisition state machine, entered once per host per run:
//
//   START -> HAS_EXPLICIT_KEY      (operator passed --api-key; always wins)
//         -> HAS_CACHED_KEY        (key cache has an entry; no network)
//         -> DISCOVER_PUBLISHED    (probe the site for an existing key file)
//         -> GENERATE_AND_VERIFY   (mint a key, walk the operator through
//                                   publishing it, verify by fetching)
//   -> READY (verified key) | ABORTED (no submissions for this host)
//
// GENERATE_AND_VERIFY needs a human to upload the key file, so in
// non-interactive mode it aborts immediately instead of hanging forever.
// =============================================================================

use anyhow::Result;
use log::{info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};

use super::cache::KeyStore;

// Fallback key file name probed even when no directory listing is available
const FALLBACK_KEY_FILE: &str = "indexnow.txt";

// Length of a freshly generated key
const GENERATED_KEY_LEN: usize = 32;

// The final word of the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// A verified, format-valid, non-empty key - submission may proceed
    Ready(String),
    /// No usable key; the caller must skip submission entirely
    Aborted(String),
}

// What the operator answered when asked whether the key file is published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Confirmed,
    Cancelled,
}

// The interactive seam: production talks to a terminal, tests substitute
// a scripted implementation
pub trait Prompter {
    /// Asks the operator to publish `key` at the given locations and waits
    /// for confirmation (or cancellation)
    fn confirm_published(&mut self, key: &str, locations: &[String]) -> PromptAnswer;
}

// Terminal-backed prompter used by the real CLI
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn confirm_published(&mut self, key: &str, locations: &[String]) -> PromptAnswer {
        println!("\n🔑 A new IndexNow key was generated for you:\n");
        println!("   {}\n", key);
        println!("Publish a plain-text file containing exactly that key at ONE of:");
        for location in locations {
            println!("   {}", location);
        }
        print!("\nPress Enter once the file is live, or type 'cancel' to abort: ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return PromptAnswer::Cancelled;
        }
        if answer.trim().eq_ignore_ascii_case("cancel") {
            PromptAnswer::Cancelled
        } else {
            PromptAnswer::Confirmed
        }
    }
}

// Runs the key acquisition state machine for one host
//
// Parameters:
//   client: shared HTTP client
//   host: the host we are submitting for (e.g., "example.com")
//   explicit_key: the --api-key value, if the operator supplied one
//   store: the key cache (file-backed in production)
//   prompter: Some(..) when running interactively, None for --non-interactive
pub async fn acquire_key(
    client: &Client,
    host: &str,
    explicit_key: Option<&str>,
    store: &mut dyn KeyStore,
    prompter: Option<&mut dyn Prompter>,
) -> Result<KeyOutcome> {
    // State: HAS_EXPLICIT_KEY
    // An operator-supplied key is accepted unconditionally (no format
    // validation beyond non-empty) and wins over everything else
    if let Some(key) = explicit_key {
        let key = key.trim();
        if !key.is_empty() {
            info!("using operator-supplied key for {}", host);
            store.save(host, key)?;
            return Ok(KeyOutcome::Ready(key.to_string()));
        }
    }

    // State: HAS_CACHED_KEY (no network probe on this path)
    if let Some(key) = store.load(host) {
        info!("using cached key for {}", host);
        return Ok(KeyOutcome::Ready(key));
    }

    // State: DISCOVER_PUBLISHED
    if let Some(key) = discover_published_key(client, host).await {
        info!("discovered published key file for {}", host);
        store.save(host, &key)?;
        return Ok(KeyOutcome::Ready(key));
    }

    // State: GENERATE_AND_VERIFY
    let Some(prompter) = prompter else {
        // Non-interactive runs have no way to confirm publication
        return Ok(KeyOutcome::Aborted(format!(
            "no cached, explicit, or discoverable key for {} and prompting is disabled",
            host
        )));
    };

    let key = generate_key();
    let locations = vec![
        format!("https://{}/{}.txt", host, key),
        format!("https://{}/.well-known/{}.txt", host, key),
    ];

    loop {
        match prompter.confirm_published(&key, &locations) {
            PromptAnswer::Cancelled => {
                return Ok(KeyOutcome::Aborted(format!(
                    "operator cancelled key publication for {}",
                    host
                )));
            }
            PromptAnswer::Confirmed => {
                // Probe both canonical locations for an exact match
                for location in &locations {
                    if let Some(body) = fetch_key_body(client, location).await {
                        if body.trim() == key {
                            info!("verified key file at {}", location);
                            store.save(host, &key)?;
                            return Ok(KeyOutcome::Ready(key));
                        }
                        warn!("key file at {} does not match the generated key", location);
                    }
                }
                println!("❌ Key file not found (or mismatched) at either location yet. \
                          It may still be propagating - try again in a moment.");
            }
        }
    }
}

// Probes the host for an already-published key file
//
// Looks at the site root and /.well-known/ for anything that resembles a
// directory listing containing token-shaped *.txt names, then falls back
// to the conventional name indexnow.txt at both locations. The first
// candidate whose body validates as a bare token wins.
async fn discover_published_key(client: &Client, host: &str) -> Option<String> {
    let bases = [
        format!("https://{}/", host),
        format!("https://{}/.well-known/", host),
    ];

    let mut candidates = Vec::new();
    let mut seen = HashSet::new();

    for base in &bases {
        if let Some(listing) = fetch_key_body(client, base).await {
            for name in token_shaped_names(&listing) {
                let candidate = format!("{}{}", base, name);
                if seen.insert(candidate.clone()) {
                    candidates.push(candidate);
                }
            }
        }
        let fallback = format!("{}{}", base, FALLBACK_KEY_FILE);
        if seen.insert(fallback.clone()) {
            candidates.push(fallback);
        }
    }

    for candidate in candidates {
        if let Some(body) = fetch_key_body(client, &candidate).await {
            let token = body.trim();
            if is_valid_token(token) {
                info!("found valid key file at {}", candidate);
                return Some(token.to_string());
            }
        }
    }

    None
}

// Finds token-shaped key file names ([A-Za-z0-9-]{8,128}.txt) in a
// directory listing body
//
// The pattern alone is not enough: a token run longer than 128 characters
// would still match on its last 128 characters, producing a bogus file
// name. A match only counts when it is not embedded in a longer run of
// token characters on either side.
fn token_shaped_names(listing: &str) -> Vec<String> {
    // Constant pattern, known valid
    let re = Regex::new(r"[A-Za-z0-9-]{8,128}\.txt").unwrap();

    let mut names = Vec::new();
    let mut seen = HashSet::new();
    for m in re.find_iter(listing) {
        let preceded = listing[..m.start()].chars().next_back().is_some_and(is_token_char);
        let followed = listing[m.end()..].chars().next().is_some_and(is_token_char);
        if preceded || followed {
            continue;
        }
        let name = m.as_str().to_string();
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

// IndexNow keys are 8-128 characters drawn from [A-Za-z0-9-]
fn is_valid_token(token: &str) -> bool {
    (8..=128).contains(&token.len())
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

// Generates a fresh 32-character alphanumeric key
fn generate_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_KEY_LEN)
        .map(char::from)
        .collect()
}

// Fetches a small text body, returning None on any failure or non-200
async fn fetch_key_body(client: &Client, url: &str) -> Option<String> {
    let response = client.get(url).send().await.ok()?;
    if response.status() != reqwest::StatusCode::OK {
        return None;
    }
    response.text().await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::MemoryKeyStore;
    use std::time::Duration;

    fn test_client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    // A prompter that always cancels; used to prove we never reach the
    // interactive state on the earlier paths
    struct AlwaysCancel;
    impl Prompter for AlwaysCancel {
        fn confirm_published(&mut self, _key: &str, _locations: &[String]) -> PromptAnswer {
            PromptAnswer::Cancelled
        }
    }

    #[test]
    fn test_generated_key_shape() {
        let key = generate_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(is_valid_token(&key));
    }

    #[test]
    fn test_token_validation() {
        assert!(is_valid_token("abcdefgh"));
        assert!(is_valid_token("a1B2c3D4-e5F6"));
        assert!(!is_valid_token("short"));
        assert!(!is_valid_token(&"x".repeat(129)));
        assert!(!is_valid_token("has spaces in it"));
        assert!(!is_valid_token("under_score8"));
    }

    #[test]
    fn test_token_shaped_names_in_listing() {
        let listing = r#"
            <html><body>
            <a href="notes.txt">notes.txt</a>
            <a href="a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4.txt">key</a>
            <a href="indexnow.txt">indexnow.txt</a>
            </body></html>
        "#;
        let names = token_shaped_names(listing);
        assert!(names.contains(&"a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4.txt".to_string()));
        assert!(names.contains(&"indexnow.txt".to_string()));
        // "notes.txt" is only 5 chars before the extension
        assert!(!names.contains(&"notes.txt".to_string()));
    }

    #[test]
    fn test_token_shaped_names_reject_overlong_runs() {
        // A 200-character token run would still match on its tail 128
        // characters; embedded matches must not become candidates
        let listing = format!("<a href=\"{}.txt\">big</a>", "a".repeat(200));
        assert!(token_shaped_names(&listing).is_empty());

        // But a maximal legal name (128 chars) is still accepted
        let listing = format!("<a href=\"{}.txt\">key</a>", "b".repeat(128));
        assert_eq!(token_shaped_names(&listing), vec![format!("{}.txt", "b".repeat(128))]);
    }

    #[test]
    fn test_token_shaped_names_reject_embedded_suffix() {
        // ".txt" followed by more token characters means the real file
        // name is something else entirely
        let listing = "see a1b2c3d4e5f6g7h8.txtserver for details";
        assert!(token_shaped_names(listing).is_empty());
    }

    #[tokio::test]
    async fn test_explicit_key_wins_over_cache() {
        let mut store = MemoryKeyStore::default();
        store.save("example.com", "cachedcachedcached").unwrap();

        let outcome = acquire_key(
            &test_client(),
            "example.com",
            Some("explicitexplicit"),
            &mut store,
            Some(&mut AlwaysCancel),
        )
        .await
        .unwrap();

        assert_eq!(outcome, KeyOutcome::Ready("explicitexplicit".to_string()));
        // The explicit key was persisted over the cached one
        assert_eq!(store.load("example.com"), Some("explicitexplicit".to_string()));
    }

    #[tokio::test]
    async fn test_cached_key_used_without_prompting() {
        let mut store = MemoryKeyStore::default();
        store.save("example.com", "cachedcachedcached").unwrap();

        let outcome = acquire_key(&test_client(), "example.com", None, &mut store, None)
            .await
            .unwrap();

        assert_eq!(outcome, KeyOutcome::Ready("cachedcachedcached".to_string()));
    }

    #[tokio::test]
    async fn test_empty_explicit_key_falls_through_to_cache() {
        let mut store = MemoryKeyStore::default();
        store.save("example.com", "cachedcachedcached").unwrap();

        let outcome = acquire_key(&test_client(), "example.com", Some("  "), &mut store, None)
            .await
            .unwrap();

        assert_eq!(outcome, KeyOutcome::Ready("cachedcachedcached".to_string()));
    }

    #[tokio::test]
    async fn test_non_interactive_without_any_key_aborts() {
        // .invalid is reserved and never resolves, so discovery probes fail
        // fast and we land in GENERATE_AND_VERIFY with no prompter
        let mut store = MemoryKeyStore::default();

        let outcome = acquire_key(&test_client(), "host.invalid", None, &mut store, None)
            .await
            .unwrap();

        assert!(matches!(outcome, KeyOutcome::Aborted(_)));
        // Nothing was persisted on the abort path
        assert_eq!(store.load("host.invalid"), None);
    }
}
