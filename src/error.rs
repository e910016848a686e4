//! Error kinds surfaced by the engine and its collaborators.
//!
//! Timeout is deliberately not represented here: an expired deadline is
//! recovered inside the recursion by returning the sentinel polynomial
//! `x(0)` and raising the engine's `timed_out` flag. Everything below
//! unwinds to the driver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed graph input. The driver reports it and skips the graph.
    #[error("bad input: {0}")]
    BadInput(String),

    /// A cache entry cannot fit, even after eviction and compaction.
    #[error("cache exhausted: entry of {requested} bytes does not fit in a {capacity} byte arena")]
    CacheExhausted { requested: usize, capacity: usize },

    /// An engine invariant was violated. Must never occur on valid input.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// An arena resize or auxiliary allocation failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),
}
