// src/session/accumulator.rs — Streamed answer buffer

use serde::Serialize;
use tokio::time::Instant;

/// Concatenates fragments in arrival order and tracks streaming time.
///
/// Elapsed time is sampled on demand, never ticked, so observers are only
/// notified when something actually arrived.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkAccumulator {
    #[serde(rename = "streamedAnswer")]
    text: String,
    #[serde(rename = "fragmentCount")]
    fragments: usize,
    #[serde(rename = "streamElapsedMs")]
    sampled_ms: u64,
    #[serde(skip)]
    anchor: Option<Instant>,
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the buffer and restart the clock.
    pub fn reset(&mut self) {
        self.text.clear();
        self.fragments = 0;
        self.sampled_ms = 0;
        self.anchor = Some(Instant::now());
    }

    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.fragments += 1;
    }

    /// Milliseconds since the last `reset()`, or 0 if never reset.
    pub fn elapsed_ms(&self) -> u64 {
        self.anchor
            .map(|a| a.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Record the current elapsed time in the snapshot and return it.
    pub fn sample(&mut self) -> u64 {
        self.sampled_ms = self.elapsed_ms();
        self.sampled_ms
    }

    pub fn sampled_ms(&self) -> u64 {
        self.sampled_ms
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
