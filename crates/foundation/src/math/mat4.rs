//! Column-major 4×4 matrices in the layout WebGL uniforms expect.

pub type Mat4 = [[f32; 4]; 4];

pub fn mat4_identity() -> Mat4 {
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Builds a matrix from the 16-element array a mapping engine hands to custom layers.
pub fn mat4_from_slice(values: &[f32]) -> Option<Mat4> {
    if values.len() != 16 {
        return None;
    }
    let mut m = [[0.0f32; 4]; 4];
    for (i, v) in values.iter().enumerate() {
        m[i / 4][i % 4] = *v;
    }
    Some(m)
}

pub fn mat4_to_array(m: &Mat4) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    for col in 0..4 {
        out[col * 4..col * 4 + 4].copy_from_slice(&m[col]);
    }
    out
}
