use foundation::math::Mat4;
use foundation::{LngLat, Projection};
use layers::{Attach, EngineError, LayerRegistration, MapEngine};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::arrows::{ArrowCanvas, ArrowSettings, ScreenSpaceArrowRenderer};
use crate::point_cloud::{PointCloudGpu, PointCloudRenderer, PointCloudSettings};
use crate::series::FlowSeries;

/// The live flow renderer, one variant per projection.
#[derive(Debug)]
pub enum FlowFieldRenderer {
    ScreenSpace(ScreenSpaceArrowRenderer),
    PointCloud(PointCloudRenderer),
}

impl FlowFieldRenderer {
    pub fn projection(&self) -> Projection {
        match self {
            FlowFieldRenderer::ScreenSpace(_) => Projection::TwoD,
            FlowFieldRenderer::PointCloud(_) => Projection::ThreeD,
        }
    }

    pub fn series(&self) -> &FlowSeries {
        match self {
            FlowFieldRenderer::ScreenSpace(r) => r.series(),
            FlowFieldRenderer::PointCloud(r) => r.series(),
        }
    }

    fn set_series(&mut self, series: FlowSeries) {
        match self {
            FlowFieldRenderer::ScreenSpace(r) => r.set_series(series),
            FlowFieldRenderer::PointCloud(r) => r.set_series(series),
        }
    }

    fn dispose(&mut self, targets: &mut FlowTargets<'_>) {
        match self {
            FlowFieldRenderer::ScreenSpace(r) => r.dispose(targets.canvas),
            FlowFieldRenderer::PointCloud(r) => r.dispose(targets.engine, targets.gpu),
        }
    }
}

/// Everything a renderer may touch while being built or torn down.
pub struct FlowTargets<'a> {
    pub engine: &'a mut dyn MapEngine,
    pub canvas: &'a mut dyn ArrowCanvas,
    pub gpu: &'a mut dyn PointCloudGpu,
}

/// Holds at most one [`FlowFieldRenderer`] and the series it was last fed.
#[derive(Debug)]
pub struct FlowRendererSlot {
    active: Option<FlowFieldRenderer>,
    series: Option<FlowSeries>,
    arrows: ArrowSettings,
    points: PointCloudSettings,
    rng: SmallRng,
    builds: u64,
}

impl FlowRendererSlot {
    pub fn new(arrows: ArrowSettings, points: PointCloudSettings, rng: SmallRng) -> Self {
        Self {
            active: None,
            series: None,
            arrows,
            points,
            rng,
            builds: 0,
        }
    }

    pub fn active(&self) -> Option<&FlowFieldRenderer> {
        self.active.as_ref()
    }

    pub fn series(&self) -> Option<&FlowSeries> {
        self.series.as_ref()
    }

    /// Number of renderers constructed so far.
    pub fn build_count(&self) -> u64 {
        self.builds
    }

    /// Custom layer of the active 3D renderer, if any.
    pub fn custom_layer(&self) -> Option<&LayerRegistration> {
        match &self.active {
            Some(FlowFieldRenderer::PointCloud(r)) => Some(r.registration()),
            _ => None,
        }
    }

    /// Feeds a new series. An active renderer keeps running with the new
    /// frames; otherwise a renderer for `projection` is built.
    pub fn load(&mut self, series: FlowSeries, projection: Projection, anchor: LngLat, targets: &mut FlowTargets<'_>) {
        self.series = Some(series.clone());
        match &mut self.active {
            Some(active) => {
                debug!("flow series updated in place ({} frames)", series.len());
                active.set_series(series);
            }
            None => self.build(projection, anchor, targets),
        }
    }

    /// Replaces the active variant with the one for `projection`. The old
    /// variant is fully disposed first. Nothing is built until a series exists.
    pub fn switch(&mut self, projection: Projection, anchor: LngLat, targets: &mut FlowTargets<'_>) {
        if self.active.as_ref().map(FlowFieldRenderer::projection) == Some(projection) {
            return;
        }
        if let Some(mut old) = self.active.take() {
            old.dispose(targets);
        }
        if self.series.is_some() {
            self.build(projection, anchor, targets);
        }
    }

    fn build(&mut self, projection: Projection, anchor: LngLat, targets: &mut FlowTargets<'_>) {
        let Some(series) = self.series.clone() else {
            return;
        };
        let rng = SmallRng::seed_from_u64(self.rng.r#gen());
        let renderer = match projection {
            Projection::TwoD => {
                FlowFieldRenderer::ScreenSpace(ScreenSpaceArrowRenderer::new(self.arrows.clone(), series, targets.engine, rng))
            }
            Projection::ThreeD => {
                let r = PointCloudRenderer::new(self.points.clone(), targets.engine, anchor, series, rng);
                match r.attach(targets.engine) {
                    Ok(Attach::Added) | Ok(Attach::AlreadyPresent) => {}
                    Err(EngineError::NotReady) => debug!("point cloud layer waits for the style"),
                    Err(err) => warn!("point cloud layer not attached: {err}"),
                }
                FlowFieldRenderer::PointCloud(r)
            }
        };
        self.builds += 1;
        info!("flow renderer built for {projection:?}");
        self.active = Some(renderer);
    }

    /// Per-frame 2D repaint. Does nothing for the 3D variant, which is driven
    /// by the engine's own render loop.
    pub fn repaint(&mut self, engine: &dyn MapEngine, canvas: &mut dyn ArrowCanvas) -> usize {
        match &mut self.active {
            Some(FlowFieldRenderer::ScreenSpace(r)) => r.repaint(engine, canvas),
            _ => 0,
        }
    }

    /// Custom-layer render callback. Returns false when no point cloud is live.
    pub fn render_custom(
        &mut self,
        engine: &mut dyn MapEngine,
        gpu: &mut dyn PointCloudGpu,
        matrix: &Mat4,
    ) -> Result<bool, EngineError> {
        match &mut self.active {
            Some(FlowFieldRenderer::PointCloud(r)) => r.render(engine, gpu, matrix).map(|()| true),
            _ => Ok(false),
        }
    }

    /// Holds the 2D renderer still while a projection change is in flight.
    pub fn set_suppressed(&mut self, suppressed: bool) {
        if let Some(FlowFieldRenderer::ScreenSpace(r)) = &mut self.active {
            r.set_suppressed(suppressed);
        }
    }

    /// Disposes the active renderer but keeps the series for a later rebuild.
    pub fn dispose(&mut self, targets: &mut FlowTargets<'_>) {
        if let Some(mut old) = self.active.take() {
            old.dispose(targets);
        }
    }

    /// Disposes the active renderer and forgets the series.
    pub fn clear(&mut self, targets: &mut FlowTargets<'_>) {
        self.dispose(targets);
        self.series = None;
    }
}
