use super::{COOK_TIME_MAX, TEMP_MAX};
use crate::datapoint::{NullObject, Reading, SensorKind, SensorReadings};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

pub(in crate::generate) fn synthesize<R: Rng + ?Sized>(
    kind: SensorKind,
    ts: DateTime<Utc>,
    text_len: usize,
    rng: &mut R,
) -> Reading {
    match kind {
        SensorKind::GenericSensor => Reading::Sensor {
            readings: SensorReadings {
                viam_uploaded: false,
                time: random_text(rng, text_len),
                kind: random_text(rng, text_len),
                temp: rng.gen_range(0.0..TEMP_MAX),
                cook_time: rng.gen_range(0.0..COOK_TIME_MAX),
                begin_time: ts.timestamp() as f64,
            },
        },
        // Movement payloads are not modeled yet; records carry metadata only.
        SensorKind::MovementSensor => Reading::Movement(NullObject::default()),
    }
}

fn random_text<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}
