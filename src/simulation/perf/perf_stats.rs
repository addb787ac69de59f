use wasm_bindgen::prelude::*;

/// Timings and counters of the last frame (zeros while perf metrics are off)
#[wasm_bindgen]
#[derive(Clone, Debug, Default)]
pub struct PerfStats {
    pub(super) step_ms: f64,
    pub(super) splat_ms: f64,
    pub(super) curl_ms: f64,
    pub(super) vorticity_ms: f64,
    pub(super) divergence_ms: f64,
    pub(super) pressure_ms: f64,
    pub(super) gradient_ms: f64,
    pub(super) advection_ms: f64,
    pub(super) render_ms: f64,
    pub(super) splats_applied: u32,
    pub(super) splats_dropped: u32,
    pub(super) pressure_iterations: u32,
    pub(super) draw_calls: u32,
    pub(super) field_bytes: u32,
}

impl PerfStats {
    pub(crate) fn reset(&mut self) {
        *self = PerfStats::default();
    }
}

#[wasm_bindgen]
impl PerfStats {
    #[wasm_bindgen(getter)]
    pub fn step_ms(&self) -> f64 { self.step_ms }
    #[wasm_bindgen(getter)]
    pub fn splat_ms(&self) -> f64 { self.splat_ms }
    #[wasm_bindgen(getter)]
    pub fn curl_ms(&self) -> f64 { self.curl_ms }
    #[wasm_bindgen(getter)]
    pub fn vorticity_ms(&self) -> f64 { self.vorticity_ms }
    #[wasm_bindgen(getter)]
    pub fn divergence_ms(&self) -> f64 { self.divergence_ms }
    #[wasm_bindgen(getter)]
    pub fn pressure_ms(&self) -> f64 { self.pressure_ms }
    #[wasm_bindgen(getter)]
    pub fn gradient_ms(&self) -> f64 { self.gradient_ms }
    #[wasm_bindgen(getter)]
    pub fn advection_ms(&self) -> f64 { self.advection_ms }
    #[wasm_bindgen(getter)]
    pub fn render_ms(&self) -> f64 { self.render_ms }
    #[wasm_bindgen(getter)]
    pub fn splats_applied(&self) -> u32 { self.splats_applied }
    #[wasm_bindgen(getter)]
    pub fn splats_dropped(&self) -> u32 { self.splats_dropped }
    #[wasm_bindgen(getter)]
    pub fn pressure_iterations(&self) -> u32 { self.pressure_iterations }
    #[wasm_bindgen(getter)]
    pub fn draw_calls(&self) -> u32 { self.draw_calls }
    #[wasm_bindgen(getter)]
    pub fn field_bytes(&self) -> u32 { self.field_bytes }
}
