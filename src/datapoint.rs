use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    GenericSensor,
    MovementSensor,
}

impl SensorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SensorKind::GenericSensor => "generic-sensor",
            SensorKind::MovementSensor => "movement-sensor",
        }
    }

    pub fn component_name(self) -> &'static str {
        match self {
            SensorKind::GenericSensor => "sensy-1",
            SensorKind::MovementSensor => "movie-1",
        }
    }

    pub fn component_type(self) -> &'static str {
        match self {
            SensorKind::GenericSensor => "rdk:component:sensor",
            SensorKind::MovementSensor => "rdk:component:movement_sensor",
        }
    }

    pub fn method_name(self) -> &'static str {
        match self {
            SensorKind::GenericSensor => "Readings",
            SensorKind::MovementSensor => "",
        }
    }
}

/// Always serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NullObject {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReadings {
    pub viam_uploaded: bool,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub temp: f64,
    pub cook_time: f64,
    pub begin_time: f64,
}

/// Payload stored under `data`, shaped by the sensor kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Sensor { readings: SensorReadings },
    Movement(NullObject),
}

/// One generated sample, serialized as a flat document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datapoint {
    pub organization_id: String,
    pub location_id: String,
    pub robot_id: String,
    pub part_id: String,
    pub component_name: &'static str,
    pub component_type: &'static str,
    pub method_name: &'static str,
    pub tags: Option<NullObject>,
    pub additional_parameters: NullObject,
    pub data: Reading,
    pub capture_day: DateTime<Utc>,
    pub time_requested: DateTime<Utc>,
    pub time_received: DateTime<Utc>,
}

pub fn capture_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive().and_time(NaiveTime::MIN).and_utc()
}
