// src/database/models.rs
use chrono::{DateTime, Utc};

use crate::{
    errors::VoyageWorkerError,
    models::{Datapoint, FixStatus, Propulsion, TripSummary, UserTrip},
};

#[derive(Debug, sqlx::FromRow)]
pub(super) struct DatapointRow {
    id: String,
    trip_id: String,
    time: DateTime<Utc>,
    lat: f64,
    lon: f64,
    speed: Option<f64>,
    heading: Option<f64>,
    depth: Option<f64>,
    h_accuracy: Option<f64>,
    v_accuracy: Option<f64>,
    propulsion: Option<i16>, // 0 anchor, 1 motor, 2 sailing
    status: i16,
}

impl TryFrom<DatapointRow> for Datapoint {
    type Error = VoyageWorkerError;

    fn try_from(row: DatapointRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            trip_id: row.trip_id,
            time: row.time,
            lat: row.lat,
            lon: row.lon,
            speed: row.speed,
            heading: row.heading,
            depth: row.depth,
            h_accuracy: row.h_accuracy,
            v_accuracy: row.v_accuracy,
            propulsion: row.propulsion.map(Propulsion::try_from).transpose()?,
            status: FixStatus::try_from(row.status)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct TripSummaryRow {
    id: String,
    dirty: bool,
}

impl From<TripSummaryRow> for TripSummary {
    fn from(row: TripSummaryRow) -> Self {
        Self {
            id: row.id,
            dirty: row.dirty,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct UserTripRow {
    trip_id: String,
    skipper_name: Option<String>,
    length_sail: f64,
    length_motor: f64,
}

impl From<UserTripRow> for UserTrip {
    fn from(row: UserTripRow) -> Self {
        Self {
            trip_id: row.trip_id,
            skipper: row.skipper_name,
            length_sail: row.length_sail,
            length_motor: row.length_motor,
        }
    }
}
