//! CurlNoise Engine - interactive 2D fluid simulation in WASM
//!
//! Architecture:
//! - core/       - errors, grid fields, texel access, math
//! - domain/     - simulation settings, dye colors
//! - gpu/        - device seam, GLSL sources, software + WebGL2 devices
//! - programs/   - stage programs and the full-screen compositor
//! - simulation/ - solver context, step pipeline, splats, frame driver
//! - api/        - JS-facing API (wasm32 only)

// Utils with texel macros (must be first for macro export!)
#[macro_use]
pub mod core;
pub mod domain;
pub mod gpu;
pub mod programs;
pub mod simulation;
#[cfg(target_arch = "wasm32")]
pub mod api;

use wasm_bindgen::prelude::*;

// Re-export wasm-bindgen-rayon for thread pool initialization
#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
pub use wasm_bindgen_rayon::init_thread_pool;

// Better error messages in debug mode
#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Initialize the engine: panic hook and console logging
#[wasm_bindgen]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    set_panic_hook();

    #[cfg(target_arch = "wasm32")]
    {
        crate::core::console_log::install(log::LevelFilter::Info);
        web_sys::console::log_1(&"🌊 CurlNoise WASM Engine initialized!".into());
    }
}

/// Get engine version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Re-export main types
#[cfg(target_arch = "wasm32")]
pub use api::wasm::FluidApp;
pub use crate::core::{EngineError, EngineResult};
pub use domain::{Rgb, SimulationConfig};
pub use gpu::software::SoftwareBackend;
pub use gpu::{GpuBackend, RenderTarget};
pub use simulation::{FieldKind, FluidCore, FrameDriver, PerfStats, Pointer, Splat, DEFAULT_DT};
