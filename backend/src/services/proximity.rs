//! Geofence admission: is the reported position inside the class circle?

use crate::error::CheckInFailure;
use crate::models::class::{Class, ClassGeofence};
use crate::utils::geo::Coordinates;

/// Result of measuring a position against a geofence. `distance_meters` is
/// `None` only when the geofence has no center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityCheck {
    pub admitted: bool,
    pub configured: bool,
    pub distance_meters: Option<f64>,
    pub allowed_radius: f64,
}

impl ProximityCheck {
    /// How deep inside the circle the position is, from 1.0 at the center to
    /// 0.0 at (or beyond) the edge.
    pub fn confidence(&self) -> Option<f64> {
        let distance = self.distance_meters?;
        if self.allowed_radius <= 0.0 {
            return Some(if distance <= 0.0 { 1.0 } else { 0.0 });
        }
        Some((1.0 - distance / self.allowed_radius).clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProximityGate;

impl ProximityGate {
    pub fn new() -> Self {
        Self
    }

    /// Pure measurement. The boundary is inclusive: a position exactly
    /// `radius` meters away is admitted.
    pub fn check(
        &self,
        position: Coordinates,
        geofence: &ClassGeofence,
    ) -> Result<ProximityCheck, CheckInFailure> {
        if !position.is_valid() {
            return Err(CheckInFailure::InvalidCoordinates);
        }
        let Some(center) = geofence.center else {
            return Ok(ProximityCheck {
                admitted: false,
                configured: false,
                distance_meters: None,
                allowed_radius: geofence.radius_meters,
            });
        };
        let distance = position.distance_to(&center);
        Ok(ProximityCheck {
            admitted: distance <= geofence.radius_meters,
            configured: true,
            distance_meters: Some(distance),
            allowed_radius: geofence.radius_meters,
        })
    }

    /// Like [`check`](Self::check) but turns a refusal into the failure the
    /// student sees.
    pub fn enforce(&self, position: Coordinates, class: &Class) -> Result<ProximityCheck, CheckInFailure> {
        let check = self.check(position, &class.geofence())?;
        if !check.configured {
            return Err(CheckInFailure::ConfigurationError(
                "This class has no classroom location configured".into(),
            ));
        }
        if !check.admitted {
            return Err(CheckInFailure::TooFar {
                distance_meters: check.distance_meters.unwrap_or_default(),
                allowed_radius: check.allowed_radius,
                room: class.room.clone(),
            });
        }
        Ok(check)
    }
}
