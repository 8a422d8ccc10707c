mod generator;
mod readings;
mod ticks;

#[cfg(test)]
mod tests;

use crate::pipeline::GenerationStats;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BATCH_SIZE: usize = 2000;
pub const DEFAULT_READING_TEXT_LEN: usize = 10_000;
const TEMP_MAX: f64 = 500.0;
const COOK_TIME_MAX: f64 = 200.0;

#[derive(Clone, Debug)]
pub struct GeneratorOptions {
    pub batch_size: usize,
    pub reading_text_len: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            reading_text_len: DEFAULT_READING_TEXT_LEN,
        }
    }
}

/// Walks a request's window tick by tick and hands full batches to a sink.
pub struct DatapointGenerator<R> {
    rng: R,
    options: GeneratorOptions,
    stats: Arc<GenerationStats>,
    cancel: CancellationToken,
}
