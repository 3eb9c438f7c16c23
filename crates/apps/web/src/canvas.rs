use flow::{Arrow, ArrowCanvas};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

const ARROW_COLOR: &str = "rgba(235, 245, 255, 0.85)";
const HEAD_PX: f64 = 4.0;
const HEAD_SPREAD_RAD: f64 = 0.5;

/// Transparent 2D canvas stacked over the map.
#[derive(Debug)]
pub struct OverlayCanvas {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl OverlayCanvas {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        Ok(Self { canvas, ctx })
    }
}

impl ArrowCanvas for OverlayCanvas {
    fn clear(&mut self) {
        let (w, h) = (self.canvas.width() as f64, self.canvas.height() as f64);
        self.ctx.clear_rect(0.0, 0.0, w, h);
    }

    fn draw_arrow(&mut self, arrow: &Arrow) {
        let tip = arrow.tip();
        if !tip.x.is_finite() || !tip.y.is_finite() {
            return;
        }
        let back = arrow.heading_rad + std::f64::consts::PI;
        let left = tip.toward(back - HEAD_SPREAD_RAD, HEAD_PX);
        let right = tip.toward(back + HEAD_SPREAD_RAD, HEAD_PX);

        let ctx = &self.ctx;
        ctx.set_stroke_style_str(ARROW_COLOR);
        ctx.set_line_width(1.5);
        ctx.begin_path();
        ctx.move_to(arrow.origin.x, arrow.origin.y);
        ctx.line_to(tip.x, tip.y);
        ctx.move_to(left.x, left.y);
        ctx.line_to(tip.x, tip.y);
        ctx.line_to(right.x, right.y);
        ctx.stroke();
    }
}
