use crate::pipeline::GenerationStats;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Logs generated/expected counts until aborted.
pub fn spawn_reporter(stats: Arc<GenerationStats>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            report(&stats);
        }
    })
}

pub fn report(stats: &GenerationStats) {
    let generated = stats.generated.load(Ordering::Relaxed);
    let expected = stats.expected.load(Ordering::Relaxed);
    tracing::info!(
        generated,
        expected,
        percent = percent(generated, expected),
        persisted = stats.persisted.load(Ordering::Relaxed),
        batches = stats.batches.load(Ordering::Relaxed),
        avg_flush_micros = stats.average_flush_micros.load(Ordering::Relaxed),
        since_last_flush_ms = ?millis_since_flush(stats, Utc::now().timestamp_millis() as u64),
        last_error = ?stats.last_error(),
        "generation progress"
    );
}

/// `None` until the first batch has been flushed.
fn millis_since_flush(stats: &GenerationStats, now_ms: u64) -> Option<u64> {
    match stats.last_flush_unix_ms.load(Ordering::Relaxed) {
        0 => None,
        last => Some(now_ms.saturating_sub(last)),
    }
}

/// Capped at 100 since `expected` is an estimate that can undercount.
fn percent(generated: u64, expected: u64) -> f64 {
    if expected == 0 {
        return 100.0;
    }
    ((generated as f64 / expected as f64) * 100.0).min(100.0)
}
