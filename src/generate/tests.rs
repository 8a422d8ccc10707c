use super::{DatapointGenerator, GeneratorOptions};
use crate::datapoint::{Datapoint, Reading};
use crate::error::{GenerationError, InvalidConfigError, SinkError};
use crate::pipeline::{BatchSink, GenerationStats};
use crate::request::{resolve, GenerationRequest, RawInputs};
use chrono::{DateTime, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingSink {
    batches: Vec<Vec<Datapoint>>,
    calls: u64,
    fail_on_call: Option<u64>,
    cancel_after_call: Option<CancellationToken>,
}

impl BatchSink for RecordingSink {
    async fn insert_batch(&mut self, records: Vec<Datapoint>) -> Result<(), SinkError> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err(SinkError::Rejected("write quorum unavailable".to_string()));
        }
        self.batches.push(records);
        if let Some(token) = self.cancel_after_call.as_ref() {
            token.cancel();
        }
        Ok(())
    }
}

impl RecordingSink {
    fn points(&self) -> Vec<&Datapoint> {
        self.batches.iter().flatten().collect()
    }

    fn batch_lens(&self) -> Vec<usize> {
        self.batches.iter().map(Vec::len).collect()
    }
}

fn request(start: &str, end: &str, frequency: i64) -> GenerationRequest {
    let raw = RawInputs {
        org_id: "org-1".to_string(),
        loc_id: "loc-1".to_string(),
        machine_id: "robot-1".to_string(),
        part_id: "part-1".to_string(),
        start_time: start.to_string(),
        end_time: Some(end.to_string()),
        is_movement_sensor: false,
        frequency,
    };
    resolve(raw, &mut StdRng::seed_from_u64(0), Utc::now()).unwrap()
}

fn generator(batch_size: usize, seed: u64) -> DatapointGenerator<StdRng> {
    generator_with_stats(batch_size, seed).0
}

fn generator_with_stats(
    batch_size: usize,
    seed: u64,
) -> (DatapointGenerator<StdRng>, Arc<GenerationStats>) {
    let stats = Arc::new(GenerationStats::new());
    let generator = DatapointGenerator::new(
        StdRng::seed_from_u64(seed),
        GeneratorOptions {
            batch_size,
            reading_text_len: 16,
        },
        stats.clone(),
        CancellationToken::new(),
    );
    (generator, stats)
}

fn at(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, h, m, s).unwrap()
}

#[tokio::test]
async fn three_second_window_at_one_hertz() {
    let request = request("2024-01-01 00:00:00", "2024-01-01 00:00:02", 1);
    let mut sink = RecordingSink::default();
    let summary = generator(100, 1)
        .generate(&request, &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.persisted, 3);
    assert_eq!(summary.batches, 1);
    let points = sink.points();
    let times: Vec<_> = points.iter().map(|p| p.time_requested).collect();
    assert_eq!(times, vec![at(1, 0, 0, 0), at(1, 0, 0, 1), at(1, 0, 0, 2)]);
    for point in points {
        assert_eq!(point.capture_day, at(1, 0, 0, 0));
        assert_eq!(point.time_received, point.time_requested);
    }
}

#[tokio::test]
async fn start_equal_to_end_yields_one_datapoint() {
    let request = request("2024-03-10 08:15:00", "2024-03-10 08:15:00", 25);
    let mut sink = RecordingSink::default();
    let summary = generator(10, 1)
        .generate(&request, &mut sink)
        .await
        .unwrap();
    assert_eq!(summary.persisted, 1);
    assert_eq!(sink.calls, 1);
}

#[tokio::test]
async fn identity_and_component_fields_are_copied() {
    let request = request("2024-01-01 00:00:00", "2024-01-01 00:00:01", 1);
    let mut sink = RecordingSink::default();
    generator(10, 1)
        .generate(&request, &mut sink)
        .await
        .unwrap();

    for point in sink.points() {
        assert_eq!(point.organization_id, "org-1");
        assert_eq!(point.location_id, "loc-1");
        assert_eq!(point.robot_id, "robot-1");
        assert_eq!(point.part_id, "part-1");
        assert_eq!(point.component_name, "sensy-1");
        assert_eq!(point.component_type, "rdk:component:sensor");
        assert_eq!(point.method_name, "Readings");
        assert!(point.tags.is_none());
        let Reading::Sensor { readings } = &point.data else {
            panic!("expected generic sensor payload");
        };
        assert_eq!(readings.time.len(), 16);
        assert_eq!(readings.begin_time, point.time_requested.timestamp() as f64);
    }
}

#[tokio::test]
async fn capture_day_follows_each_tick_across_midnight() {
    let request = request("2024-01-01 23:59:58", "2024-01-02 00:00:02", 2);
    let mut sink = RecordingSink::default();
    generator(3, 1)
        .generate(&request, &mut sink)
        .await
        .unwrap();

    let points = sink.points();
    assert_eq!(points.len(), 9);
    for point in points {
        let ts = point.time_requested;
        assert_eq!(point.capture_day.date_naive(), ts.date_naive());
        assert_eq!(point.capture_day.num_seconds_from_midnight(), 0);
        assert_eq!(point.capture_day.nanosecond(), 0);
        assert_eq!(point.time_received, ts);
    }
    assert_eq!(sink.batches[0][0].capture_day, at(1, 0, 0, 0));
    assert_eq!(sink.batches[2][2].capture_day, at(2, 0, 0, 0));
}

#[tokio::test]
async fn batches_are_bounded_and_ordered() {
    let request = request("2024-01-01 00:00:00", "2024-01-01 00:00:06", 1);
    let mut sink = RecordingSink::default();
    let summary = generator(3, 1)
        .generate(&request, &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.batch_lens(), vec![3, 3, 1]);
    assert_eq!(summary.batches, 3);
    let times: Vec<_> = sink.points().iter().map(|p| p.time_requested).collect();
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(times.first(), Some(&at(1, 0, 0, 0)));
    assert_eq!(times.last(), Some(&at(1, 0, 0, 6)));
}

#[tokio::test]
async fn count_matches_tick_formula_for_sub_second_periods() {
    let request = request("2024-01-01 00:00:00", "2024-01-01 00:00:03", 4);
    let mut sink = RecordingSink::default();
    let summary = generator(5, 1)
        .generate(&request, &mut sink)
        .await
        .unwrap();
    assert_eq!(summary.persisted, 13);
    assert_eq!(summary.persisted, request.tick_count());
}

#[tokio::test]
async fn sink_failure_on_second_batch_stops_the_run() {
    let request = request("2024-01-01 00:00:00", "2024-01-01 00:00:08", 1);
    let mut sink = RecordingSink {
        fail_on_call: Some(2),
        ..RecordingSink::default()
    };
    let (mut generator, stats) = generator_with_stats(3, 1);
    let err = generator.generate(&request, &mut sink).await.unwrap_err();

    match err {
        GenerationError::Sink {
            batch,
            len,
            first,
            last,
            source,
        } => {
            assert_eq!(batch, 2);
            assert_eq!(len, 3);
            assert_eq!(first, at(1, 0, 0, 3));
            assert_eq!(last, at(1, 0, 0, 5));
            assert!(matches!(source, SinkError::Rejected(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(sink.calls, 2);
    assert_eq!(sink.batch_lens(), vec![3]);
    assert_eq!(sink.batches[0][0].time_requested, at(1, 0, 0, 0));

    assert_eq!(stats.persisted.load(Ordering::Relaxed), 3);
    assert_eq!(stats.batches.load(Ordering::Relaxed), 1);
    assert!(stats.last_error().is_some());
}

#[tokio::test]
async fn cancellation_is_checked_after_each_batch() {
    let request = request("2024-01-01 00:00:00", "2024-01-01 00:01:00", 1);
    let cancel = CancellationToken::new();
    let mut generator = DatapointGenerator::new(
        StdRng::seed_from_u64(1),
        GeneratorOptions {
            batch_size: 10,
            reading_text_len: 4,
        },
        Arc::new(GenerationStats::new()),
        cancel.clone(),
    );
    let mut sink = RecordingSink {
        cancel_after_call: Some(cancel),
        ..RecordingSink::default()
    };

    let err = generator.generate(&request, &mut sink).await.unwrap_err();
    assert!(matches!(err, GenerationError::Cancelled { persisted: 10 }));
    assert_eq!(sink.calls, 1);
}

#[tokio::test]
async fn cancellation_after_the_final_full_batch_completes_the_run() {
    let request = request("2024-01-01 00:00:00", "2024-01-01 00:00:09", 1);
    let cancel = CancellationToken::new();
    let mut generator = DatapointGenerator::new(
        StdRng::seed_from_u64(1),
        GeneratorOptions {
            batch_size: 10,
            reading_text_len: 4,
        },
        Arc::new(GenerationStats::new()),
        cancel.clone(),
    );
    let mut sink = RecordingSink {
        cancel_after_call: Some(cancel),
        ..RecordingSink::default()
    };

    let summary = generator.generate(&request, &mut sink).await.unwrap();
    assert_eq!(summary.persisted, 10);
    assert_eq!(summary.batches, 1);
    assert_eq!(sink.calls, 1);
}

#[tokio::test]
async fn huge_batch_size_does_not_reserve_the_whole_batch() {
    let request = request("2024-01-01 00:00:00", "2024-01-01 00:00:02", 1);
    let mut sink = RecordingSink::default();
    let summary = generator(1usize << 40, 1)
        .generate(&request, &mut sink)
        .await
        .unwrap();
    assert_eq!(summary.persisted, 3);
    assert_eq!(sink.batch_lens(), vec![3]);
}

#[tokio::test]
async fn movement_sensor_emits_bare_metadata_records() {
    let raw = RawInputs {
        start_time: "2024-01-01 00:00:00".to_string(),
        end_time: Some("2024-01-01 00:00:01".to_string()),
        is_movement_sensor: true,
        frequency: 2,
        ..RawInputs::default()
    };
    let request = resolve(raw, &mut StdRng::seed_from_u64(0), Utc::now()).unwrap();
    let mut sink = RecordingSink::default();
    generator(10, 1)
        .generate(&request, &mut sink)
        .await
        .unwrap();

    let points = sink.points();
    assert_eq!(points.len(), 3);
    for point in points {
        assert!(matches!(point.data, Reading::Movement(_)));
        assert_eq!(point.component_name, "movie-1");
        assert_eq!(point.method_name, "");
    }
}

#[tokio::test]
async fn seeded_generators_are_reproducible() {
    let request = request("2024-01-01 00:00:00", "2024-01-01 00:00:04", 1);
    let mut first = RecordingSink::default();
    let mut second = RecordingSink::default();
    generator(2, 42)
        .generate(&request, &mut first)
        .await
        .unwrap();
    generator(2, 42)
        .generate(&request, &mut second)
        .await
        .unwrap();
    assert_eq!(first.batches, second.batches);
}

#[tokio::test]
async fn inverted_window_produces_nothing() {
    let mut request = request("2024-01-01 00:00:00", "2024-01-01 00:00:04", 1);
    std::mem::swap(&mut request.start_time, &mut request.end_time);
    let mut sink = RecordingSink::default();
    let summary = generator(2, 1)
        .generate(&request, &mut sink)
        .await
        .unwrap();
    assert_eq!(summary.persisted, 0);
    assert_eq!(sink.calls, 0);
}

#[tokio::test]
async fn sub_nanosecond_period_fails_instead_of_hanging() {
    let mut request = request("2024-01-01 00:00:00", "2024-01-01 00:00:01", 1);
    request.frequency = u32::MAX;
    let mut sink = RecordingSink::default();
    let err = generator(2, 1)
        .generate(&request, &mut sink)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::NonAdvancingCursor { .. }));
    assert_eq!(sink.calls, 0);
}

async fn resolve_and_generate(
    raw: RawInputs,
    sink: &mut RecordingSink,
) -> anyhow::Result<u64> {
    let request = resolve(raw, &mut StdRng::seed_from_u64(0), Utc::now())?;
    let summary = generator(10, 1).generate(&request, sink).await?;
    Ok(summary.persisted)
}

#[tokio::test]
async fn malformed_start_never_reaches_the_sink() {
    let raw = RawInputs {
        start_time: "01/01/2024".to_string(),
        end_time: Some("2024-01-01 00:00:05".to_string()),
        frequency: 1,
        ..RawInputs::default()
    };
    let mut sink = RecordingSink::default();
    let err = resolve_and_generate(raw, &mut sink).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InvalidConfigError>(),
        Some(InvalidConfigError::Timestamp { .. })
    ));
    assert_eq!(sink.calls, 0);

    let valid = RawInputs {
        start_time: "2024-01-01 00:00:00".to_string(),
        end_time: Some("2024-01-01 00:00:05".to_string()),
        frequency: 1,
        ..RawInputs::default()
    };
    assert_eq!(resolve_and_generate(valid, &mut sink).await.unwrap(), 6);
    assert_eq!(sink.calls, 1);
}

#[tokio::test]
async fn stats_expose_expected_and_generated_counts() {
    let request = request("2024-01-01 00:00:00", "2024-01-01 00:02:30", 2);
    let mut sink = RecordingSink::default();
    let (mut generator, stats) = generator_with_stats(100, 1);
    generator.generate(&request, &mut sink).await.unwrap();

    assert_eq!(stats.expected.load(Ordering::Relaxed), 240);
    assert_eq!(stats.generated.load(Ordering::Relaxed), 301);
    assert_eq!(stats.persisted.load(Ordering::Relaxed), 301);
    assert_eq!(stats.last_batch_len.load(Ordering::Relaxed), 1);
}
