//! Defines the [`Place`], [`VisitEntry`], and [`Coordinates`] types. Places
//! come out of the places document with only their descriptive fields set;
//! [`crate::assemble`] fills in coordinates, images, and visited status later.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A latitude/longitude pair. Serializes as a two-element array
/// (`[lat, lon]`), which is what both the project file and the page payload
/// use.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lon: f64) -> Coordinates {
        Coordinates { lat, lon }
    }
}

impl From<(f64, f64)> for Coordinates {
    fn from((lat, lon): (f64, f64)) -> Coordinates {
        Coordinates { lat, lon }
    }
}

impl From<Coordinates> for (f64, f64) {
    fn from(c: Coordinates) -> (f64, f64) {
        (c.lat, c.lon)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// One catalogued location. The serialized form is the per-location object
/// of the page payload; absent optional fields are omitted rather than
/// written as `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Place {
    /// The place's name. Visit-log entries and the predefined coordinate
    /// table refer to places by this exact string.
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// The photo directory, relative to the project root.
    #[serde(skip)]
    pub pics: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    pub visited: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl Place {
    pub fn new(name: impl Into<String>) -> Place {
        Place {
            name: name.into(),
            ..Place::default()
        }
    }
}

/// A dated lunch visit from the lunch log.
#[derive(Clone, Debug, PartialEq)]
pub struct VisitEntry {
    pub date: NaiveDate,
    pub name: String,
    pub location_description: Option<String>,
}
