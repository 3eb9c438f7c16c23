use serde::{Deserialize, Serialize};

/// Geographic position in degrees (WGS84 longitude/latitude).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lon: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Moves the position `step_deg` degrees along a compass heading.
    ///
    /// `heading_rad` is measured clockwise from north, so `0` moves north and
    /// `PI / 2` moves east.
    pub fn advanced(self, heading_rad: f64, step_deg: f64) -> Self {
        Self::new(
            self.lon + step_deg * heading_rad.sin(),
            self.lat + step_deg * heading_rad.cos(),
        )
    }

    pub fn as_array(self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Axis-aligned geographic bounding box in degrees.
///
/// `east` may exceed 180 when the box straddles the antimeridian; the box is
/// never normalized so that interpolation stays continuous.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LngLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl LngLatBounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Square box of `half_extent_deg` around `center`, latitude clamped to the poles.
    pub fn around(center: LngLat, half_extent_deg: f64) -> Self {
        let h = half_extent_deg.abs();
        Self::new(
            center.lon - h,
            (center.lat - h).max(-90.0),
            center.lon + h,
            (center.lat + h).min(90.0),
        )
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(
            0.5 * (self.west + self.east),
            0.5 * (self.south + self.north),
        )
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: LngLat) -> bool {
        p.lon >= self.west && p.lon <= self.east && p.lat >= self.south && p.lat <= self.north
    }

    /// Point at normalized `(u, v)` in `[0, 1]²`, measured from the south-west corner.
    pub fn lerp(&self, u: f64, v: f64) -> LngLat {
        let u = u.clamp(0.0, 1.0);
        let v = v.clamp(0.0, 1.0);
        LngLat::new(
            self.west + u * self.width(),
            self.south + v * self.height(),
        )
    }

    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let out = Self::new(
            self.west.max(other.west),
            self.south.max(other.south),
            self.east.min(other.east),
            self.north.min(other.north),
        );
        (out.west <= out.east && out.south <= out.north).then_some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::{LngLat, LngLatBounds};

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {a} ~= {b}");
    }

    #[test]
    fn advanced_follows_compass_heading() {
        let p = LngLat::new(10.0, 20.0);
        let east = p.advanced(std::f64::consts::FRAC_PI_2, 1.0);
        assert_close(east.lon, 11.0);
        assert_close(east.lat, 20.0);

        let west = p.advanced(270f64.to_radians(), 0.5);
        assert_close(west.lon, 9.5);
        assert_close(west.lat, 20.0);
    }

    #[test]
    fn lerp_stays_inside_and_hits_corners() {
        let b = LngLatBounds::new(2.2, 48.8, 2.5, 48.9);
        assert_eq!(b.lerp(0.0, 0.0), LngLat::new(2.2, 48.8));
        assert_close(b.lerp(1.0, 1.0).lon, 2.5);
        assert!(b.contains(b.lerp(0.3, 0.7)));
        assert!(b.contains(b.lerp(4.0, -1.0)));
    }

    #[test]
    fn around_clamps_latitude() {
        let b = LngLatBounds::around(LngLat::new(0.0, 89.0), 2.0);
        assert_eq!(b.north, 90.0);
        assert_eq!(b.south, 87.0);
    }

    #[test]
    fn intersect_disjoint_is_none() {
        let a = LngLatBounds::new(0.0, 0.0, 1.0, 1.0);
        let b = LngLatBounds::new(2.0, 2.0, 3.0, 3.0);
        assert!(a.intersect(&b).is_none());
        let c = LngLatBounds::new(0.5, -1.0, 4.0, 0.5);
        assert_eq!(a.intersect(&c), Some(LngLatBounds::new(0.5, 0.0, 1.0, 0.5)));
    }

    #[test]
    fn lnglat_deserializes_from_json() {
        let p: LngLat = serde_json::from_str(r#"{"lon": 2.35, "lat": 48.86}"#).unwrap();
        assert_eq!(p, LngLat::new(2.35, 48.86));
    }
}
