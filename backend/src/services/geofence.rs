use crate::models::attendance::Coordinates;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
pub const DEFAULT_CAMPUS_RADIUS_METERS: f64 = 500.0;

/// Circular campus boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceValidator {
    center: Coordinates,
    radius_meters: f64,
}

impl GeofenceValidator {
    pub fn new(center: Coordinates, radius_meters: f64) -> Self {
        Self {
            center,
            radius_meters,
        }
    }

    pub fn center(&self) -> Coordinates {
        self.center
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// Haversine great-circle distance from the campus centre.
    pub fn distance_to(&self, point: Coordinates) -> f64 {
        haversine_meters(self.center, point)
    }

    pub fn is_within_campus(&self, point: Coordinates) -> bool {
        self.distance_to(point) <= self.radius_meters
    }
}

pub fn haversine_meters(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}
