//! GPU point cloud drawn inside the map's render pass.
//!
//! Points are sampled once around the focus anchor and uploaded as a single
//! vertex buffer. Animation is a drift offset along the wind heading, applied
//! as a uniform and wrapped inside the sampled extent, so the buffer is never
//! rewritten after the first draw.

use bytemuck::{Pod, Zeroable};
use foundation::math::{Mat4, MercatorCoord, mercator_units_per_meter};
use foundation::{LngLat, LngLatBounds};
use layers::symbology::Rgba;
use layers::{Attach, EngineError, LayerRegistration, MapEngine, attach_custom_layer};
use rand::Rng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::series::FlowSeries;

pub const POINT_CLOUD_LAYER: &str = "wind-points";

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PointVertex {
    /// Normalized mercator position, z in mercator units above sea level.
    pub position: [f32; 3],
    /// Per-point animation phase in `[0, 1)`.
    pub phase: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Uniforms for one draw of the point buffer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointDraw {
    pub matrix: Mat4,
    pub count: u32,
    /// Offset added to every point before wrapping into `origin..origin + extent`.
    pub drift: [f32; 2],
    pub origin: [f32; 2],
    pub extent: [f32; 2],
    pub point_size: f32,
    pub color: [f32; 4],
}

/// Graphics context handed to the custom layer by the engine.
pub trait PointCloudGpu {
    fn upload(&mut self, vertices: &[u8], count: usize) -> Result<BufferHandle, EngineError>;
    fn draw(&mut self, buffer: BufferHandle, draw: &PointDraw);
    fn release(&mut self, buffer: BufferHandle);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointCloudSettings {
    pub point_count: usize,
    /// Half-size of the sampled square around the anchor, in degrees.
    pub anchor_radius_deg: f64,
    pub altitude_min_m: f64,
    pub altitude_max_m: f64,
    pub point_size_px: f32,
    /// Meters of drift per frame per m/s of wind speed.
    pub drift_m_per_speed: f64,
    pub color: Rgba,
}

impl Default for PointCloudSettings {
    fn default() -> Self {
        Self {
            point_count: 1800,
            anchor_radius_deg: 0.35,
            altitude_min_m: 80.0,
            altitude_max_m: 900.0,
            point_size_px: 3.0,
            drift_m_per_speed: 2.5,
            color: Rgba::new(0.55, 0.85, 1.0, 0.85),
        }
    }
}

#[derive(Debug)]
pub struct PointCloudRenderer {
    settings: PointCloudSettings,
    vertices: Vec<PointVertex>,
    area: LngLatBounds,
    origin: [f64; 2],
    extent: [f64; 2],
    drift: [f64; 2],
    series: FlowSeries,
    registration: LayerRegistration,
    buffer: Option<BufferHandle>,
}

impl PointCloudRenderer {
    /// Samples the cloud around `anchor`, clipped to the visible bounds, at
    /// random heights above the terrain.
    pub fn new(
        settings: PointCloudSettings,
        engine: &dyn MapEngine,
        anchor: LngLat,
        series: FlowSeries,
        mut rng: SmallRng,
    ) -> Self {
        let around = LngLatBounds::around(anchor, settings.anchor_radius_deg);
        let area = around.intersect(&engine.bounds()).unwrap_or(around);

        let (lo, hi) = (
            settings.altitude_min_m.min(settings.altitude_max_m),
            settings.altitude_min_m.max(settings.altitude_max_m),
        );
        let vertices = (0..settings.point_count)
            .map(|_| {
                let p = area.lerp(rng.r#gen::<f64>(), rng.r#gen::<f64>());
                let ground = engine.query_terrain_elevation(p).unwrap_or(0.0);
                let altitude = ground + lo + (hi - lo) * rng.r#gen::<f64>();
                PointVertex {
                    position: MercatorCoord::from_lnglat(p, altitude).to_f32(),
                    phase: rng.r#gen::<f32>(),
                }
            })
            .collect();

        let nw = MercatorCoord::from_lnglat(LngLat::new(area.west, area.north), 0.0);
        let se = MercatorCoord::from_lnglat(LngLat::new(area.east, area.south), 0.0);
        let registration = LayerRegistration::custom(POINT_CLOUD_LAYER);

        Self {
            settings,
            vertices,
            area,
            origin: [nw.x, nw.y],
            extent: [(se.x - nw.x).max(f64::EPSILON), (se.y - nw.y).max(f64::EPSILON)],
            drift: [0.0, 0.0],
            series,
            registration,
            buffer: None,
        }
    }

    pub fn registration(&self) -> &LayerRegistration {
        &self.registration
    }

    pub fn is_registered(&self, engine: &dyn MapEngine) -> bool {
        self.registration.is_attached(engine)
    }

    pub fn vertices(&self) -> &[PointVertex] {
        &self.vertices
    }

    pub fn area(&self) -> LngLatBounds {
        self.area
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    pub fn drift(&self) -> [f64; 2] {
        self.drift
    }

    pub fn series(&self) -> &FlowSeries {
        &self.series
    }

    pub fn set_series(&mut self, series: FlowSeries) {
        self.series.replace(series);
    }

    /// Adds the custom layer beneath the current style's first label layer.
    pub fn attach(&self, engine: &mut dyn MapEngine) -> Result<Attach, EngineError> {
        let below_labels = self.registration.clone().with_insert_before(engine.first_symbol_layer());
        attach_custom_layer(engine, &below_labels)
    }

    /// Custom-layer render callback. Uploads the buffer on first use, draws
    /// with the engine's matrix and asks for the next repaint.
    pub fn render(
        &mut self,
        engine: &mut dyn MapEngine,
        gpu: &mut dyn PointCloudGpu,
        matrix: &Mat4,
    ) -> Result<(), EngineError> {
        let buffer = match self.buffer {
            Some(buffer) => buffer,
            None => {
                let buffer = gpu.upload(bytemuck::cast_slice(&self.vertices), self.vertices.len())?;
                debug!("uploaded {} wind points", self.vertices.len());
                self.buffer = Some(buffer);
                buffer
            }
        };

        if let Some(frame) = self.series.current().copied() {
            let heading = frame.heading_rad();
            let step = frame.speed_ms
                * self.settings.drift_m_per_speed
                * mercator_units_per_meter(self.area.center().lat);
            // Mercator y grows southwards.
            self.drift[0] = (self.drift[0] + step * heading.sin()).rem_euclid(self.extent[0]);
            self.drift[1] = (self.drift[1] - step * heading.cos()).rem_euclid(self.extent[1]);
            self.series.advance();
        }

        gpu.draw(
            buffer,
            &PointDraw {
                matrix: *matrix,
                count: self.vertices.len() as u32,
                drift: [self.drift[0] as f32, self.drift[1] as f32],
                origin: [self.origin[0] as f32, self.origin[1] as f32],
                extent: [self.extent[0] as f32, self.extent[1] as f32],
                point_size: self.settings.point_size_px,
                color: self.settings.color.0,
            },
        );
        engine.trigger_repaint();
        Ok(())
    }

    /// Removes the custom layer (if registered) and frees the GPU buffer.
    pub fn dispose(&mut self, engine: &mut dyn MapEngine, gpu: &mut dyn PointCloudGpu) {
        if engine.is_style_loaded() {
            self.registration.detach(engine);
        }
        if let Some(buffer) = self.buffer.take() {
            gpu.release(buffer);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use foundation::math::mat4_identity;
    use layers::EngineConfig;
    use layers::memory::{BASEMAP_LABEL_LAYER, MemoryEngine};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingGpu {
        next: u32,
        pub live: Vec<BufferHandle>,
        pub uploads: usize,
        pub draws: Vec<PointDraw>,
    }

    impl PointCloudGpu for RecordingGpu {
        fn upload(&mut self, vertices: &[u8], count: usize) -> Result<BufferHandle, EngineError> {
            assert_eq!(vertices.len(), count * std::mem::size_of::<PointVertex>());
            self.next += 1;
            self.uploads += 1;
            let handle = BufferHandle(self.next);
            self.live.push(handle);
            Ok(handle)
        }

        fn draw(&mut self, buffer: BufferHandle, draw: &PointDraw) {
            assert!(self.live.contains(&buffer));
            self.draws.push(*draw);
        }

        fn release(&mut self, buffer: BufferHandle) {
            self.live.retain(|b| *b != buffer);
        }
    }

    fn engine() -> MemoryEngine {
        let mut e = MemoryEngine::loaded(&EngineConfig::default());
        e.set_bounds(LngLatBounds::new(2.0, 48.5, 2.7, 49.2));
        e
    }

    fn paris() -> LngLat {
        LngLat::new(2.3522, 48.8566)
    }

    #[test]
    fn samples_inside_visible_area_above_terrain() {
        let mut engine = engine();
        engine.set_terrain(Some(&foundation::SourceId::new("composite")), 1.0);
        engine.set_ground_elevation(500.0);
        let settings = PointCloudSettings::default();
        let r = PointCloudRenderer::new(settings.clone(), &engine, paris(), FlowSeries::default(), SmallRng::seed_from_u64(5));

        assert_eq!(r.vertices().len(), settings.point_count);
        let nw = MercatorCoord::from_lnglat(LngLat::new(r.area().west, r.area().north), 0.0);
        let se = MercatorCoord::from_lnglat(LngLat::new(r.area().east, r.area().south), 0.0);
        let min_z = (500.0 + settings.altitude_min_m) * mercator_units_per_meter(r.area().south);
        for v in r.vertices() {
            let [x, y, z] = v.position;
            assert!(x as f64 >= nw.x - 1e-6 && x as f64 <= se.x + 1e-6);
            assert!(y as f64 >= nw.y - 1e-6 && y as f64 <= se.y + 1e-6);
            assert!(z as f64 >= min_z * 0.99);
            assert!((0.0..1.0).contains(&v.phase));
        }
    }

    #[test]
    fn registers_beneath_labels() {
        let mut engine = engine();
        let r = PointCloudRenderer::new(
            PointCloudSettings::default(),
            &engine,
            paris(),
            FlowSeries::default(),
            SmallRng::seed_from_u64(5),
        );
        assert_eq!(r.attach(&mut engine), Ok(Attach::Added));
        assert_eq!(r.attach(&mut engine), Ok(Attach::AlreadyPresent));
        let ids = engine.layer_ids();
        let points = ids.iter().position(|id| id.as_str() == POINT_CLOUD_LAYER).unwrap();
        let labels = ids.iter().position(|id| id.as_str() == BASEMAP_LABEL_LAYER).unwrap();
        assert!(points < labels);
    }

    #[test]
    fn reattach_uses_labels_of_the_current_style() {
        let mut engine = engine();
        let r = PointCloudRenderer::new(
            PointCloudSettings::default(),
            &engine,
            paris(),
            FlowSeries::default(),
            SmallRng::seed_from_u64(5),
        );
        r.attach(&mut engine).unwrap();

        engine.set_label_layer("settlement-label");
        engine.set_style("mapbox://styles/mapbox/satellite-streets-v12");
        engine.finish_style_load();
        assert_eq!(r.attach(&mut engine), Ok(Attach::Added));

        let ids = engine.layer_ids();
        let points = ids.iter().position(|id| id.as_str() == POINT_CLOUD_LAYER).unwrap();
        let labels = ids.iter().position(|id| id.as_str() == "settlement-label").unwrap();
        assert!(points < labels);
    }

    #[test]
    fn render_uploads_once_and_requests_repaint() {
        let mut engine = engine();
        let mut gpu = RecordingGpu::default();
        let series = FlowSeries::from_samples([(90.0, 4.0), (180.0, 2.0)]);
        let mut r = PointCloudRenderer::new(PointCloudSettings::default(), &engine, paris(), series, SmallRng::seed_from_u64(5));
        r.attach(&mut engine).unwrap();

        for _ in 0..3 {
            r.render(&mut engine, &mut gpu, &mat4_identity()).unwrap();
        }
        assert_eq!(gpu.uploads, 1);
        assert_eq!(gpu.draws.len(), 3);
        assert_eq!(engine.repaint_requests(), 3);
        assert_eq!(r.series().cursor(), 1);
        // First frame blows from the east: drift wraps westwards.
        let first = gpu.draws[0];
        assert!(first.drift[0] > 0.0 && first.drift[0] < first.extent[0]);
        assert_eq!(first.count as usize, r.vertices().len());
    }

    #[test]
    fn dispose_is_safe_when_never_registered() {
        let mut engine = engine();
        let mut gpu = RecordingGpu::default();
        let mut r = PointCloudRenderer::new(
            PointCloudSettings::default(),
            &engine,
            paris(),
            FlowSeries::from_samples([(0.0, 1.0)]),
            SmallRng::seed_from_u64(1),
        );
        let before = engine.layer_ids();
        r.dispose(&mut engine, &mut gpu);
        assert_eq!(engine.layer_ids(), before);

        r.attach(&mut engine).unwrap();
        r.render(&mut engine, &mut gpu, &mat4_identity()).unwrap();
        r.dispose(&mut engine, &mut gpu);
        r.dispose(&mut engine, &mut gpu);
        assert!(!r.is_registered(&engine));
        assert!(gpu.live.is_empty());
        assert_eq!(r.buffer(), None);
    }
}
