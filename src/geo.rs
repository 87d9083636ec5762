use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Great-circle distance in kilometers on a sphere of radius [`EARTH_RADIUS_KM`].
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Distance between a user's home and an epicenter, rounded to 2 decimals.
///
/// Returns `None` when the home is unknown or either point is not a finite
/// coordinate; the caller treats that as "undetermined".
pub fn distance_km(home: Option<Coordinate>, epicenter: Coordinate) -> Option<f64> {
    let home = home?;
    if !home.is_finite() || !epicenter.is_finite() {
        return None;
    }
    Some(round_2(haversine_km(home, epicenter)))
}

fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
