// src/submit/mod.rs
// =============================================================================
// This module submits URL batches to the IndexNow engine endpoints.
//
// Submodules:
// - policy: The engine roster and each engine's declarative retry policy
// - engine: Batching, the generic retry driver, and stats accounting
//
// Every engine gets every batch; one engine's failure never blocks another
// engine or a later batch. Partial failure is the expected steady state of
// a multi-engine run.
// =============================================================================

mod engine;
mod policy;

pub use engine::{submit, SubmitConfig};
pub use policy::{engines, Engine, RetryPolicy};
