//! WebGL2 point renderer for the map's custom layer.
//!
//! Everything runs on the GL context the map hands to the layer. Attribute
//! arrays and the array buffer binding are unbound after each draw; the map
//! restores the rest of its state itself.

use std::collections::BTreeMap;

use flow::{BufferHandle, PointCloudGpu, PointDraw, PointVertex};
use foundation::math::mat4_to_array;
use layers::EngineError;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::{WebGl2RenderingContext as Gl, WebGlBuffer, WebGlProgram, WebGlShader, WebGlUniformLocation};

use crate::mapbox::fg_gl;

const VERTEX_SHADER: &str = r#"#version 300 es
uniform mat4 u_matrix;
uniform vec2 u_drift;
uniform vec2 u_origin;
uniform vec2 u_extent;
uniform float u_size;
in vec3 a_position;
in float a_phase;
out float v_phase;
void main() {
    vec2 p = mod(a_position.xy - u_origin + u_drift, u_extent) + u_origin;
    gl_Position = u_matrix * vec4(p, a_position.z, 1.0);
    gl_PointSize = u_size;
    v_phase = a_phase;
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
uniform vec4 u_color;
in float v_phase;
out vec4 out_color;
void main() {
    float d = length(gl_PointCoord - vec2(0.5));
    if (d > 0.5) discard;
    float a = u_color.a * (0.55 + 0.45 * v_phase) * (1.0 - 2.0 * d);
    out_color = vec4(u_color.rgb * a, a);
}
"#;

const STRIDE: i32 = std::mem::size_of::<PointVertex>() as i32;

struct Uniforms {
    matrix: Option<WebGlUniformLocation>,
    drift: Option<WebGlUniformLocation>,
    origin: Option<WebGlUniformLocation>,
    extent: Option<WebGlUniformLocation>,
    size: Option<WebGlUniformLocation>,
    color: Option<WebGlUniformLocation>,
}

struct PointProgram {
    gl: Gl,
    program: WebGlProgram,
    a_position: u32,
    a_phase: u32,
    uniforms: Uniforms,
}

fn backend(msg: impl Into<String>) -> EngineError {
    EngineError::Backend(msg.into())
}

fn compile(gl: &Gl, kind: u32, source: &str) -> Result<WebGlShader, EngineError> {
    let shader = gl.create_shader(kind).ok_or_else(|| backend("create_shader failed"))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);
    if gl
        .get_shader_parameter(&shader, Gl::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(shader)
    } else {
        let log = gl.get_shader_info_log(&shader).unwrap_or_default();
        gl.delete_shader(Some(&shader));
        Err(backend(format!("shader compile failed: {log}")))
    }
}

impl PointProgram {
    fn new(gl: Gl) -> Result<Self, EngineError> {
        let vs = compile(&gl, Gl::VERTEX_SHADER, VERTEX_SHADER)?;
        let fs = compile(&gl, Gl::FRAGMENT_SHADER, FRAGMENT_SHADER)?;
        let program = gl.create_program().ok_or_else(|| backend("create_program failed"))?;
        gl.attach_shader(&program, &vs);
        gl.attach_shader(&program, &fs);
        gl.link_program(&program);
        gl.delete_shader(Some(&vs));
        gl.delete_shader(Some(&fs));
        if !gl
            .get_program_parameter(&program, Gl::LINK_STATUS)
            .as_bool()
            .unwrap_or(false)
        {
            let log = gl.get_program_info_log(&program).unwrap_or_default();
            gl.delete_program(Some(&program));
            return Err(backend(format!("program link failed: {log}")));
        }

        let attrib = |name: &str| -> Result<u32, EngineError> {
            u32::try_from(gl.get_attrib_location(&program, name)).map_err(|_| backend(format!("missing attribute {name}")))
        };
        let a_position = attrib("a_position")?;
        let a_phase = attrib("a_phase")?;
        let uniforms = Uniforms {
            matrix: gl.get_uniform_location(&program, "u_matrix"),
            drift: gl.get_uniform_location(&program, "u_drift"),
            origin: gl.get_uniform_location(&program, "u_origin"),
            extent: gl.get_uniform_location(&program, "u_extent"),
            size: gl.get_uniform_location(&program, "u_size"),
            color: gl.get_uniform_location(&program, "u_color"),
        };
        debug!("point cloud program linked");
        Ok(Self {
            gl,
            program,
            a_position,
            a_phase,
            uniforms,
        })
    }
}

/// [`PointCloudGpu`] over the map's WebGL2 context. The program is built on
/// the first upload, once the map has handed the context to the layer.
#[derive(Default)]
pub struct WebGlPoints {
    program: Option<PointProgram>,
    buffers: BTreeMap<u32, WebGlBuffer>,
    next: u32,
}

impl std::fmt::Debug for WebGlPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebGlPoints")
            .field("linked", &self.program.is_some())
            .field("buffers", &self.buffers.len())
            .finish()
    }
}

impl WebGlPoints {
    fn program(&mut self) -> Result<&PointProgram, EngineError> {
        if self.program.is_none() {
            let gl = fg_gl()
                .dyn_into::<Gl>()
                .map_err(|_| backend("WebGL2 context not available yet"))?;
            self.program = Some(PointProgram::new(gl)?);
        }
        self.program.as_ref().ok_or_else(|| backend("point program missing"))
    }
}

impl PointCloudGpu for WebGlPoints {
    fn upload(&mut self, vertices: &[u8], count: usize) -> Result<BufferHandle, EngineError> {
        let p = self.program()?;
        let buffer = p.gl.create_buffer().ok_or_else(|| backend("create_buffer failed"))?;
        p.gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&buffer));
        p.gl.buffer_data_with_u8_array(Gl::ARRAY_BUFFER, vertices, Gl::STATIC_DRAW);
        p.gl.bind_buffer(Gl::ARRAY_BUFFER, None);

        self.next += 1;
        self.buffers.insert(self.next, buffer);
        debug!("point buffer {} holds {count} vertices", self.next);
        Ok(BufferHandle(self.next))
    }

    fn draw(&mut self, buffer: BufferHandle, draw: &PointDraw) {
        let (Some(p), Some(buf)) = (self.program.as_ref(), self.buffers.get(&buffer.0)) else {
            warn!("draw with unknown point buffer {}", buffer.0);
            return;
        };
        let gl = &p.gl;
        gl.use_program(Some(&p.program));
        gl.bind_buffer(Gl::ARRAY_BUFFER, Some(buf));
        gl.enable_vertex_attrib_array(p.a_position);
        gl.vertex_attrib_pointer_with_i32(p.a_position, 3, Gl::FLOAT, false, STRIDE, 0);
        gl.enable_vertex_attrib_array(p.a_phase);
        gl.vertex_attrib_pointer_with_i32(p.a_phase, 1, Gl::FLOAT, false, STRIDE, 12);

        let u = &p.uniforms;
        gl.uniform_matrix4fv_with_f32_array(u.matrix.as_ref(), false, &mat4_to_array(&draw.matrix));
        gl.uniform2fv_with_f32_array(u.drift.as_ref(), &draw.drift);
        gl.uniform2fv_with_f32_array(u.origin.as_ref(), &draw.origin);
        gl.uniform2fv_with_f32_array(u.extent.as_ref(), &draw.extent);
        gl.uniform1f(u.size.as_ref(), draw.point_size);
        gl.uniform4fv_with_f32_array(u.color.as_ref(), &draw.color);

        gl.enable(Gl::BLEND);
        gl.blend_func(Gl::ONE, Gl::ONE_MINUS_SRC_ALPHA);
        gl.draw_arrays(Gl::POINTS, 0, draw.count as i32);

        gl.disable_vertex_attrib_array(p.a_position);
        gl.disable_vertex_attrib_array(p.a_phase);
        gl.bind_buffer(Gl::ARRAY_BUFFER, None);
    }

    fn release(&mut self, buffer: BufferHandle) {
        if let Some(buf) = self.buffers.remove(&buffer.0) {
            if let Some(p) = &self.program {
                p.gl.delete_buffer(Some(&buf));
            }
        }
    }
}
