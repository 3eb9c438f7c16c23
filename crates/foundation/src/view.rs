use serde::{Deserialize, Serialize};

/// Presentation dimension of the visualization.
///
/// `TwoD` renders flat (mercator, no pitch) with screen-space arrows;
/// `ThreeD` renders the globe with terrain and the GPU point cloud.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Projection {
    #[default]
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
}

impl Projection {
    pub fn toggled(self) -> Self {
        match self {
            Projection::TwoD => Projection::ThreeD,
            Projection::ThreeD => Projection::TwoD,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "3d" | "three_d" | "three" | "globe" => Projection::ThreeD,
            _ => Projection::TwoD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Projection;

    #[test]
    fn parses_and_toggles() {
        assert_eq!(Projection::from_str(" 3D "), Projection::ThreeD);
        assert_eq!(Projection::from_str("anything"), Projection::TwoD);
        assert_eq!(Projection::TwoD.toggled(), Projection::ThreeD);
        assert_eq!(Projection::default(), Projection::TwoD);
    }
}
