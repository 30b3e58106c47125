// src/submit/engine.rs
// =============================================================================
// This module drives batched IndexNow submissions.
//
// Key functionality:
// - Deduplicates and partitions the URL list into bounded batches
// - POSTs each batch to every engine, several engines concurrently
// - One generic retry driver consumes each engine's RetryPolicy descriptor
// - Folds per-engine outcomes into run-level Stats after each batch
//
// The protocol returns one status per batch per engine, never per-URL
// results, so success is tracked at engine granularity and reported at URL
// granularity as a proportional estimate (fraction of engines that accepted
// the batch, times the batch's URL count). That is an approximation, not a
// per-URL guarantee.
// =============================================================================

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};

use super::policy::{engines, Engine, RetryPolicy};
use crate::report::Stats;

// Hard ceiling on batch size imposed by the IndexNow protocol
const HARD_BATCH_CAP: usize = 5000;

// Short pause between successive batches so we don't burst the endpoints;
// independent of the per-engine retry delays
const INTER_BATCH_DELAY: Duration = Duration::from_millis(200);

// Runtime knobs for a submission run
#[derive(Debug, Clone)]
pub struct SubmitConfig {
    /// Requested batch size (clamped to 1..=5000)
    pub batch_size: usize,
    /// How many engines we talk to at once within a batch
    pub max_concurrent: usize,
}

// The IndexNow bulk submission body
//
// Wire format: {"host": ..., "key": ..., "urlList": [...]}
#[derive(Debug, Serialize)]
struct Payload<'a> {
    host: &'a str,
    key: &'a str,
    #[serde(rename = "urlList")]
    url_list: &'a [String],
}

// How one (batch, engine) pair ultimately ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// The engine answered 2xx
    Accepted,
    /// 429s exhausted every allowed attempt
    RateLimited,
    /// Propagation-sensitive 403s exhausted the soft retry schedule
    SoftAuthFailed,
    /// Any other non-2xx, or a transport error
    HardFailed,
}

// Per (batch, engine) result, folded into Stats right after the batch
#[derive(Debug)]
struct EndpointResult {
    engine: &'static str,
    outcome: Outcome,
    /// Status code of the final response, None for a transport error
    status: Option<u16>,
    /// Requests actually sent for this (batch, engine) pair
    attempts: u32,
    /// Retry events recorded along the way
    retries: usize,
}

// What the retry driver should do after one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Accept,
    RetryRateLimit(Duration),
    RetrySoftAuth(Duration),
    Fail(Outcome),
}

// Submits the full URL list for a host and returns accumulated Stats
//
// Parameters:
//   client: shared HTTP client
//   urls: resolved URL list (deduplicated here, order preserved)
//   host: the submitting host (must own every URL in the list)
//   key: the verified IndexNow key for that host
//   config: batch size and concurrency knobs
pub async fn submit(
    client: &Client,
    urls: &[String],
    host: &str,
    key: &str,
    config: &SubmitConfig,
) -> Stats {
    let started = Instant::now();

    let deduped = dedup_preserving_order(urls);
    let cap = config.batch_size.clamp(1, HARD_BATCH_CAP);
    let roster = engines();

    let mut stats = Stats::new(roster.iter().map(|e| e.name).collect());
    stats.urls_found = deduped.len();

    let batches: Vec<&[String]> = deduped.chunks(cap).collect();
    let total_batches = batches.len();

    for (index, batch) in batches.iter().enumerate() {
        println!(
            "📤 Submitting batch {}/{} ({} URLs) to {} engines...",
            index + 1,
            total_batches,
            batch.len(),
            roster.len()
        );

        let payload = Payload { host, key, url_list: batch };
        // Serializing strings into JSON cannot fail
        let body = serde_json::to_string(&payload).expect("payload serialization failed");

        // One future per engine, at most max_concurrent in flight; every
        // engine must finish (accept or exhaust retries) before we reduce
        let results: Vec<EndpointResult> = stream::iter(
            roster
                .iter()
                .map(|engine| submit_batch_to_engine(client, engine, body.clone())),
        )
        .buffer_unordered(config.max_concurrent.max(1))
        .collect()
        .await;

        for result in &results {
            debug!(
                "batch {}: {} -> {:?} (status {:?}, {} attempts, {} retries)",
                index + 1,
                result.engine,
                result.outcome,
                result.status,
                result.attempts,
                result.retries
            );
        }

        let accepted = results
            .iter()
            .filter(|r| r.outcome == Outcome::Accepted)
            .count();
        let (successful, failed) = proportional_accounting(batch.len(), accepted, roster.len());

        stats.successful += successful;
        stats.failed += failed;
        stats.retried += results.iter().map(|r| r.retries).sum::<usize>();
        stats.batches += 1;

        info!(
            "batch {}/{}: {}/{} engines accepted",
            index + 1,
            total_batches,
            accepted,
            roster.len()
        );

        if index + 1 < total_batches {
            tokio::time::sleep(INTER_BATCH_DELAY).await;
        }
    }

    stats.elapsed = started.elapsed();
    stats
}

// Drives one batch against one engine until accepted or out of retries
async fn submit_batch_to_engine(
    client: &Client,
    engine: &Engine,
    body: String,
) -> EndpointResult {
    // Counters scoped to this (batch, engine) pair only
    let mut rate_limited_seen = 0u32;
    let mut soft_auth_seen = 0u32;
    let mut attempts = 0u32;
    let mut retries = 0usize;

    loop {
        attempts += 1;
        let status = post_batch(client, engine.endpoint, body.clone()).await;

        match next_action(&engine.policy, status, rate_limited_seen, soft_auth_seen) {
            Action::Accept => {
                info!("{} accepted the batch (HTTP {})", engine.name, status.unwrap_or(0));
                return EndpointResult {
                    engine: engine.name,
                    outcome: Outcome::Accepted,
                    status,
                    attempts,
                    retries,
                };
            }
            Action::RetryRateLimit(delay) => {
                rate_limited_seen += 1;
                retries += 1;
                warn!(
                    "{} rate limited us (429), backing off {}s (attempt {}/{})",
                    engine.name,
                    delay.as_secs(),
                    rate_limited_seen,
                    engine.policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }
            Action::RetrySoftAuth(delay) => {
                soft_auth_seen += 1;
                retries += 1;
                warn!(
                    "{} answered 403 - the key may still be propagating, retrying in {}s",
                    engine.name,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }
            Action::Fail(outcome) => {
                match status {
                    Some(code) => error!(
                        "{} rejected the batch: HTTP {} ({:?})",
                        engine.name, code, outcome
                    ),
                    None => error!("{} unreachable: transport error ({:?})", engine.name, outcome),
                }
                return EndpointResult {
                    engine: engine.name,
                    outcome,
                    status,
                    attempts,
                    retries,
                };
            }
        }
    }
}

// Decides the next step from one response status and the retry counters
//
// Pure so the whole policy surface is testable without a network:
//   - 200/202 accept
//   - 429 backs off exponentially until max_attempts is spent
//   - 403 retries on the fixed soft schedule, but only for engines whose
//     policy carries one; everyone else hard-fails immediately
//   - anything else (including transport errors, status None) hard-fails
fn next_action(
    policy: &RetryPolicy,
    status: Option<u16>,
    rate_limited_seen: u32,
    soft_auth_seen: u32,
) -> Action {
    match status {
        Some(200) | Some(202) => Action::Accept,
        Some(429) => {
            // This response consumed attempt number rate_limited_seen + 1
            if rate_limited_seen + 1 >= policy.max_attempts {
                Action::Fail(Outcome::RateLimited)
            } else {
                Action::RetryRateLimit(policy.rate_limit_delay(rate_limited_seen + 1))
            }
        }
        Some(403) if policy.retries_soft_auth() => {
            if soft_auth_seen + 1 >= policy.max_soft_auth_attempts() {
                Action::Fail(Outcome::SoftAuthFailed)
            } else {
                Action::RetrySoftAuth(policy.soft_auth_delays[soft_auth_seen as usize])
            }
        }
        _ => Action::Fail(Outcome::HardFailed),
    }
}

// POSTs the JSON body to an endpoint, returning the status code or None
// on a transport-level failure (timeout, connect, TLS)
async fn post_batch(client: &Client, endpoint: &str, body: String) -> Option<u16> {
    let result = client
        .post(endpoint)
        .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
        .body(body)
        .send()
        .await;

    match result {
        Ok(response) => Some(response.status().as_u16()),
        Err(e) => {
            warn!("request to {} failed: {}", endpoint, e);
            None
        }
    }
}

// Removes duplicates while keeping the first appearance of each URL
fn dedup_preserving_order(urls: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.iter()
        .filter(|url| seen.insert(url.as_str()))
        .cloned()
        .collect()
}

// Splits engine-level acceptance into URL-level success/failure counts
//
// accepted/total engines, times the batch's URL count, rounded down;
// the remainder of the batch counts as failed.
fn proportional_accounting(batch_len: usize, accepted: usize, total: usize) -> (usize, usize) {
    if total == 0 {
        return (0, batch_len);
    }
    let successful = batch_len * accepted / total;
    (successful, batch_len - successful)
}
