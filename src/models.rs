//! Data models.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::errors::VoyageWorkerError;

/// How the vessel was moving when a fix was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Propulsion {
    /// At anchor or moored; distance is not counted
    Anchor,
    /// Under engine
    Motor,
    /// Under sail
    Sailing,
}

impl TryFrom<i16> for Propulsion {
    type Error = VoyageWorkerError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Anchor),
            1 => Ok(Self::Motor),
            2 => Ok(Self::Sailing),
            other => Err(VoyageWorkerError::InvalidPropulsion(other)),
        }
    }
}

impl From<Propulsion> for i16 {
    fn from(value: Propulsion) -> Self {
        match value {
            Propulsion::Anchor => 0,
            Propulsion::Motor => 1,
            Propulsion::Sailing => 2,
        }
    }
}

/// Simplification state of a fix
///
/// A fix starts out `Pending` and is moved exactly once to either `Removed`
/// or `Retained`. Stores never move a fix out of `Removed` or `Retained`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FixStatus {
    #[default]
    Pending,
    Removed,
    Retained,
}

impl TryFrom<i16> for FixStatus {
    type Error = VoyageWorkerError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Removed),
            2 => Ok(Self::Retained),
            other => Err(VoyageWorkerError::InvalidStatus(other)),
        }
    }
}

impl From<FixStatus> for i16 {
    fn from(value: FixStatus) -> Self {
        match value {
            FixStatus::Pending => 0,
            FixStatus::Removed => 1,
            FixStatus::Retained => 2,
        }
    }
}

/// A single recorded GPS position belonging to a trip
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub id: String,
    pub trip_id: String,
    pub time: DateTime<Utc>,
    /// Latitude in WGS84 decimal degrees
    pub lat: f64,
    /// Longitude in WGS84 decimal degrees
    pub lon: f64,
    /// Speed over ground in knots
    pub speed: Option<f64>,
    /// Heading in degrees, 0-360
    pub heading: Option<f64>,
    /// Depth below transducer in meters
    pub depth: Option<f64>,
    /// Horizontal accuracy in meters
    pub h_accuracy: Option<f64>,
    /// Vertical accuracy in meters
    pub v_accuracy: Option<f64>,
    pub propulsion: Option<Propulsion>,
    pub status: FixStatus,
}

impl Datapoint {
    /// Create a pending fix with only position and time set
    pub fn new(
        id: impl Into<String>,
        trip_id: impl Into<String>,
        time: DateTime<Utc>,
        lat: f64,
        lon: f64,
    ) -> Self {
        Self {
            id: id.into(),
            trip_id: trip_id.into(),
            time,
            lat,
            lon,
            speed: None,
            heading: None,
            depth: None,
            h_accuracy: None,
            v_accuracy: None,
            propulsion: None,
            status: FixStatus::Pending,
        }
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn with_propulsion(mut self, propulsion: Propulsion) -> Self {
        self.propulsion = Some(propulsion);
        self
    }

    /// Position as a `geo` point (x = longitude, y = latitude)
    pub fn point(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

/// A recorded voyage and its derived statistics
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trip {
    pub id: String,
    pub name: String,
    pub skipper: Option<String>,
    pub crew: Vec<String>,
    pub dirty: bool,
    pub length_sail: Option<f64>,
    pub length_motor: Option<f64>,
    pub start_point_id: Option<String>,
    pub end_point_id: Option<String>,
    /// Names of regions the trip has passed through
    pub regions: BTreeSet<String>,
}

impl Trip {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_skipper(mut self, username: impl Into<String>) -> Self {
        self.skipper = Some(username.into());
        self
    }

    pub fn with_crew(mut self, username: impl Into<String>) -> Self {
        self.crew.push(username.into());
        self
    }

    /// Skipper and crew, without duplicates
    pub fn participants(&self) -> BTreeSet<&str> {
        self.skipper
            .iter()
            .chain(self.crew.iter())
            .map(String::as_str)
            .collect()
    }
}

/// A user whose distance totals are derived from their trips
#[derive(Debug, Clone, PartialEq, Default)]
pub struct User {
    pub username: String,
    /// Totals are stale and must be recomputed
    pub recalculate: bool,
    pub totals: UserTotals,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }
}

/// A trip as seen by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripSummary {
    pub id: String,
    /// Derived statistics are stale
    pub dirty: bool,
}

/// Derived statistics written by the aggregator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TripStats {
    /// Meters travelled under sail
    pub length_sail: f64,
    /// Meters travelled under engine
    pub length_motor: f64,
    pub start_point_id: Option<String>,
    pub end_point_id: Option<String>,
}

/// One of a user's trips, with the totals needed for user statistics
#[derive(Debug, Clone, PartialEq)]
pub struct UserTrip {
    pub trip_id: String,
    pub skipper: Option<String>,
    pub length_sail: f64,
    pub length_motor: f64,
}

/// Per-user distance totals across all their trips
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserTotals {
    pub crewed_length_sail: f64,
    pub crewed_length_motor: f64,
    pub skippered_length_sail: f64,
    pub skippered_length_motor: f64,
}
