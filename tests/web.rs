//! Browser tests, run with `wasm-pack test --headless --chrome`
#![cfg(target_arch = "wasm32")]

use curlnoise_engine::{FluidCore, RenderTarget, SimulationConfig, SoftwareBackend, DEFAULT_DT};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn init_is_idempotent() {
    curlnoise_engine::init();
    curlnoise_engine::init();
    assert_eq!(curlnoise_engine::version(), env!("CARGO_PKG_VERSION"));
}

#[wasm_bindgen_test]
fn software_frame_runs_with_js_clock() {
    let config = SimulationConfig {
        sim_resolution: 16,
        dye_resolution: 32,
        ..Default::default()
    };
    let mut core = FluidCore::new(SoftwareBackend::new(32, 32), config).unwrap();
    core.enable_perf_metrics(true);
    core.apply_random_burst(2).unwrap();
    core.step(DEFAULT_DT).unwrap();
    core.render(RenderTarget::Screen).unwrap();
    assert!(core.get_perf_stats().step_ms() >= 0.0);
}
