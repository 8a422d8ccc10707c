use super::readings::synthesize;
use super::ticks::Ticks;
use super::{DatapointGenerator, GeneratorOptions, DEFAULT_BATCH_SIZE};
use crate::datapoint::{capture_day, Datapoint, NullObject};
use crate::error::GenerationError;
use crate::pipeline::{BatchSink, GenerationStats};
use crate::request::GenerationRequest;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    pub persisted: u64,
    pub batches: u64,
}

impl<R: Rng> DatapointGenerator<R> {
    pub fn new(
        rng: R,
        options: GeneratorOptions,
        stats: Arc<GenerationStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rng,
            options,
            stats,
            cancel,
        }
    }

    pub async fn generate<S: BatchSink>(
        &mut self,
        request: &GenerationRequest,
        sink: &mut S,
    ) -> Result<GenerationSummary, GenerationError> {
        let batch_size = self.options.batch_size.max(1);
        self.stats
            .expected
            .store(request.expected_count, Ordering::Relaxed);

        let mut ticks = Ticks::new(request.start_time, request.end_time, request.frequency)
            .ok_or(GenerationError::NonAdvancingCursor {
                frequency: request.frequency,
            })?;

        tracing::info!(
            kind = request.sensor_kind.as_str(),
            frequency = request.frequency,
            batch_size,
            "generating datapoints"
        );

        // Oversized batches grow on demand instead of reserving up front.
        let mut batch: Vec<Datapoint> = Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE));
        let mut summary = GenerationSummary::default();

        while let Some(ts) = ticks.next() {
            let point = self.datapoint(request, ts);
            batch.push(point);
            self.stats.record_generated();

            if batch.len() >= batch_size {
                self.flush(sink, &mut batch, &mut summary).await?;
                if self.cancel.is_cancelled() && !ticks.is_exhausted() {
                    tracing::warn!(persisted = summary.persisted, "generation cancelled");
                    return Err(GenerationError::Cancelled {
                        persisted: summary.persisted,
                    });
                }
            }
        }

        if ticks.stalled() {
            return Err(GenerationError::NonAdvancingCursor {
                frequency: request.frequency,
            });
        }

        self.flush(sink, &mut batch, &mut summary).await?;
        tracing::info!(
            persisted = summary.persisted,
            batches = summary.batches,
            "generation complete"
        );
        Ok(summary)
    }

    fn datapoint(&mut self, request: &GenerationRequest, ts: DateTime<Utc>) -> Datapoint {
        let kind = request.sensor_kind;
        Datapoint {
            organization_id: request.org_id.clone(),
            location_id: request.loc_id.clone(),
            robot_id: request.machine_id.clone(),
            part_id: request.part_id.clone(),
            component_name: kind.component_name(),
            component_type: kind.component_type(),
            method_name: kind.method_name(),
            tags: None,
            additional_parameters: NullObject::default(),
            data: synthesize(kind, ts, self.options.reading_text_len, &mut self.rng),
            capture_day: capture_day(ts),
            time_requested: ts,
            time_received: ts,
        }
    }

    async fn flush<S: BatchSink>(
        &self,
        sink: &mut S,
        batch: &mut Vec<Datapoint>,
        summary: &mut GenerationSummary,
    ) -> Result<(), GenerationError> {
        let (Some(first), Some(last)) = (
            batch.first().map(|p| p.time_requested),
            batch.last().map(|p| p.time_requested),
        ) else {
            return Ok(());
        };

        let capacity = batch.capacity();
        let items = std::mem::replace(batch, Vec::with_capacity(capacity));
        let len = items.len();
        summary.batches += 1;
        let ordinal = summary.batches;
        let started = Instant::now();

        match sink.insert_batch(items).await {
            Ok(()) => {
                let elapsed = started.elapsed();
                self.stats.record_flush(len, elapsed);
                summary.persisted += len as u64;
                tracing::debug!(
                    batch = ordinal,
                    len,
                    micros = elapsed.as_micros() as u64,
                    "flushed datapoint batch"
                );
                Ok(())
            }
            Err(source) => {
                self.stats.record_error(source.to_string());
                tracing::error!(error = %source, batch = ordinal, len, "failed to flush datapoints");
                Err(GenerationError::Sink {
                    batch: ordinal,
                    len,
                    first,
                    last,
                    source,
                })
            }
        }
    }
}
