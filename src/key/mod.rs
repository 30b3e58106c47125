// src/key/mod.rs
// =============================================================================
// This module owns the per-host IndexNow API key.
//
// Submodules:
// - cache: Persistent host -> key storage (a small JSON file per user)
// - manager: The acquisition state machine (explicit key, cached key,
//   discovery of an already-published key file, or generate-and-verify)
//
// The cache is passed in explicitly as a trait object so tests can
// substitute an in-memory store, and the interactive prompt sits behind a
// trait for the same reason.
// =============================================================================

mod cache;
mod manager;

pub use cache::{FileKeyStore, KeyStore};
pub use manager::{acquire_key, ConsolePrompter, KeyOutcome, PromptAnswer, Prompter};

#[cfg(test)]
pub use cache::MemoryKeyStore;
