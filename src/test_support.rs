use crate::datapoint::{capture_day, Datapoint, NullObject, Reading, SensorKind};
use chrono::{DateTime, Utc};

pub(crate) fn datapoint_at(ts: DateTime<Utc>, data: Reading) -> Datapoint {
    let kind = match data {
        Reading::Sensor { .. } => SensorKind::GenericSensor,
        Reading::Movement(_) => SensorKind::MovementSensor,
    };
    Datapoint {
        organization_id: "org".to_string(),
        location_id: "loc".to_string(),
        robot_id: "robot".to_string(),
        part_id: "part".to_string(),
        component_name: kind.component_name(),
        component_type: kind.component_type(),
        method_name: kind.method_name(),
        tags: None,
        additional_parameters: NullObject::default(),
        data,
        capture_day: capture_day(ts),
        time_requested: ts,
        time_received: ts,
    }
}

pub(crate) fn movement_point(ts: DateTime<Utc>) -> Datapoint {
    datapoint_at(ts, Reading::Movement(NullObject::default()))
}
