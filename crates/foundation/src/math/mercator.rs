use crate::bounds::LngLat;

/// Mean earth radius used by web-mercator renderers (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;
/// Circumference at the equator for [`EARTH_RADIUS_M`] (meters).
pub const EARTH_CIRCUMFERENCE_M: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS_M;

/// Normalized web-mercator coordinates: `x`, `y` in `[0, 1]` across the world,
/// `y` growing southwards, `z` in the same units scaled at the point's latitude.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MercatorCoord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MercatorCoord {
    pub fn from_lnglat(p: LngLat, altitude_m: f64) -> Self {
        let x = (180.0 + p.lon) / 360.0;
        let lat = p.lat.clamp(-85.051_129, 85.051_129);
        let y = (180.0
            - (180.0 / std::f64::consts::PI)
                * (std::f64::consts::FRAC_PI_4 + lat.to_radians() * 0.5).tan().ln())
            / 360.0;
        let z = altitude_m * mercator_units_per_meter(lat);
        Self { x, y, z }
    }

    pub fn to_f32(self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }
}

/// Size of one meter in normalized mercator units at `lat_deg`.
pub fn mercator_units_per_meter(lat_deg: f64) -> f64 {
    1.0 / (EARTH_CIRCUMFERENCE_M * lat_deg.to_radians().cos().max(1e-9))
}
