/// Position on the overlay canvas in CSS pixels, origin top-left, y down.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point `length` pixels away along a compass heading (0 = up, clockwise).
    pub fn toward(self, heading_rad: f64, length: f64) -> Self {
        Self::new(
            self.x + length * heading_rad.sin(),
            self.y - length * heading_rad.cos(),
        )
    }

    pub fn distance(self, other: Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Compass heading from `self` to `other` in `[0, 2π)`.
    pub fn heading_to(self, other: Self) -> f64 {
        let h = (other.x - self.x).atan2(self.y - other.y);
        h.rem_euclid(std::f64::consts::TAU)
    }
}

impl std::ops::Add for ScreenPoint {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for ScreenPoint {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}
