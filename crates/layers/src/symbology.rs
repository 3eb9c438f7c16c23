use serde::{Deserialize, Serialize};

/// RGBA color in linear `[0, 1]` components.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rgba(pub [f32; 4]);

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([r, g, b, a])
    }

    /// CSS `rgba(...)` string understood by style paint properties.
    pub fn to_css(self) -> String {
        let [r, g, b, a] = self.0;
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("rgba({}, {}, {}, {})", byte(r), byte(g), byte(b), a.clamp(0.0, 1.0))
    }

    pub fn alpha(self) -> f32 {
        self.0[3]
    }
}

/// Paint for the selected-location boundary overlay.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightStyle {
    pub fill: Rgba,
    pub outline: Rgba,
    pub outline_width_px: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            fill: Rgba::new(0.86, 0.16, 0.16, 0.18),
            outline: Rgba::new(0.90, 0.10, 0.10, 1.0),
            outline_width_px: 2.5,
        }
    }
}
