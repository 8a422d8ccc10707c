use crate::datapoint::SensorKind;
use crate::error::InvalidConfigError;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rand::Rng;

pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_TIME_FORMAT_HINT: &str = "YYYY-MM-DD HH:MM:SS";

/// Unvalidated inputs as they arrive from the command line.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub org_id: String,
    pub loc_id: String,
    pub machine_id: String,
    pub part_id: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub is_movement_sensor: bool,
    pub frequency: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub org_id: String,
    pub loc_id: String,
    pub machine_id: String,
    pub part_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub sensor_kind: SensorKind,
    pub frequency: u32,
    pub expected_count: u64,
}

impl GenerationRequest {
    pub fn period_seconds(&self) -> f64 {
        1.0 / f64::from(self.frequency)
    }

    /// Ideal number of ticks in `[start, end]`, `floor(span / period) + 1`.
    ///
    /// The generator accumulates the period by repeated f64 addition, and on
    /// long windows the running offset can overshoot `end`, so the boundary
    /// tick is dropped and the generated count is one lower than this.
    pub fn tick_count(&self) -> u64 {
        let span = self.end_time - self.start_time;
        let Some(nanos) = span.num_nanoseconds() else {
            return 0;
        };
        if nanos < 0 {
            return 0;
        }
        let ticks = (nanos as f64 / 1e9) / self.period_seconds();
        ticks.floor() as u64 + 1
    }
}

pub fn resolve<R: Rng + ?Sized>(
    raw: RawInputs,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<GenerationRequest, InvalidConfigError> {
    let start_time = parse_time("start time", &raw.start_time)?;
    let end_time = match raw.end_time.as_deref() {
        None => now,
        Some(value) => parse_time("end time", value)?,
    };
    if end_time < start_time {
        return Err(InvalidConfigError::EndBeforeStart {
            start: start_time,
            end: end_time,
        });
    }
    let frequency = u32::try_from(raw.frequency)
        .ok()
        .filter(|hz| *hz > 0)
        .ok_or(InvalidConfigError::Frequency(raw.frequency))?;

    let sensor_kind = if raw.is_movement_sensor {
        SensorKind::MovementSensor
    } else {
        SensorKind::GenericSensor
    };

    Ok(GenerationRequest {
        org_id: value_or_random_id(raw.org_id, rng),
        loc_id: value_or_random_id(raw.loc_id, rng),
        machine_id: value_or_random_id(raw.machine_id, rng),
        part_id: value_or_random_id(raw.part_id, rng),
        start_time,
        end_time,
        sensor_kind,
        frequency,
        expected_count: expected_count(frequency, start_time, end_time),
    })
}

/// Progress-bar sizing estimate: whole minutes of the window times samples per minute.
/// Windows that are not whole minutes undercount relative to `tick_count`.
pub fn expected_count(frequency: u32, start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let minutes = (end - start).num_minutes().max(0) as u64;
    minutes
        .saturating_mul(u64::from(frequency))
        .saturating_mul(60)
}

fn parse_time(field: &'static str, input: &str) -> Result<DateTime<Utc>, InvalidConfigError> {
    NaiveDateTime::parse_from_str(input.trim(), DATE_TIME_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|source| InvalidConfigError::Timestamp {
            field,
            input: input.to_string(),
            expected: DATE_TIME_FORMAT_HINT,
            source,
        })
}

fn value_or_random_id<R: Rng + ?Sized>(value: String, rng: &mut R) -> String {
    if value.trim().is_empty() {
        random_id(rng)
    } else {
        value
    }
}

pub fn random_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    uuid::Builder::from_random_bytes(rng.gen())
        .into_uuid()
        .hyphenated()
        .to_string()
}
