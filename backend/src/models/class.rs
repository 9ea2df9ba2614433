use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{ClassId, UserId};
use crate::utils::geo::Coordinates;

/// Radius applied when a class has a center but never set its own radius.
pub const DEFAULT_GEOFENCE_RADIUS_METERS: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Class {
    pub id: ClassId,
    pub professor_id: UserId,
    pub name: String,
    pub room: Option<String>,
    pub geofence_latitude: Option<f64>,
    pub geofence_longitude: Option<f64>,
    pub geofence_radius_meters: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Circular admission region around a classroom. `center == None` means the
/// class was never configured for proximity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassGeofence {
    pub center: Option<Coordinates>,
    pub radius_meters: f64,
}

impl ClassGeofence {
    pub fn new(center: Coordinates, radius_meters: f64) -> Self {
        Self {
            center: Some(center),
            radius_meters,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.center.is_some()
    }
}

impl Class {
    pub fn geofence(&self) -> ClassGeofence {
        let radius_meters = self
            .geofence_radius_meters
            .unwrap_or(DEFAULT_GEOFENCE_RADIUS_METERS);
        match (self.geofence_latitude, self.geofence_longitude) {
            (Some(latitude), Some(longitude)) => {
                ClassGeofence::new(Coordinates::new(latitude, longitude), radius_meters)
            }
            // A half-set center is as good as no center.
            _ => ClassGeofence {
                center: None,
                radius_meters,
            },
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.professor_id == user_id
    }
}
