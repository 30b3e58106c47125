// src/report.rs
// =============================================================================
// This module accumulates run statistics and renders the final report.
//
// Stats is the single run-level accumulator: the submission engine folds
// per-batch results into it, and the report is a pure reduction over the
// final value - no side effects beyond printing.
// =============================================================================

use std::time::Duration;

// Everything we know about one submission run
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// URLs found across all resolved sitemaps (after dedup)
    pub urls_found: usize,
    /// URL-granularity successful submissions (proportional estimate)
    pub successful: usize,
    /// URL-granularity failed submissions (proportional estimate)
    pub failed: usize,
    /// Retry events recorded across all engines and batches
    pub retried: usize,
    /// Batches processed
    pub batches: usize,
    /// Wall-clock duration of the submission phase
    pub elapsed: Duration,
    /// Names of the engines contacted
    pub engines: Vec<&'static str>,
}

impl Stats {
    pub fn new(engines: Vec<&'static str>) -> Self {
        Stats {
            engines,
            ..Default::default()
        }
    }

    /// Fraction of found URLs that were (estimated) successfully submitted
    pub fn success_rate(&self) -> f64 {
        self.successful as f64 / self.urls_found.max(1) as f64
    }
}

// Prints the human-readable summary of a finished run
//
// This output is for people, not programs; nothing should parse it.
pub fn print_report(stats: &Stats) {
    println!();
    println!("=== IndexNow Submission Report ===");
    println!("   🔗 URLs found:             {}", stats.urls_found);
    println!("   ✅ Successful submissions: {}", stats.successful);
    println!("   ❌ Failed submissions:     {}", stats.failed);
    println!("   🔁 Retried submissions:    {}", stats.retried);
    println!("   📦 Batches processed:      {}", stats.batches);
    println!("   📈 Success rate:           {:.2}%", stats.success_rate() * 100.0);
    println!("   ⏱️  Elapsed:                {:.1}s", stats.elapsed.as_secs_f64());
    println!("   🌐 Engines contacted:      {}", stats.engines.join(", "));
    println!("==================================");
}
