use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::WebGl2RenderingContext;

use crate::core::error::EngineError;
use crate::domain::{Rgb, SimulationConfig};
use crate::gpu::webgl::WebGlBackend;
use crate::simulation::{FluidCore, FrameDriver, PerfStats, Splat};

type Driver = FrameDriver<WebGlBackend>;
type TickSlot = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

fn to_js(e: EngineError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn request_frame(tick: &Closure<dyn FnMut()>) -> Result<i32, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    window.request_animation_frame(tick.as_ref().unchecked_ref())
}

/// A fluid simulation drawing into the canvas of a WebGL2 context
#[wasm_bindgen]
pub struct FluidApp {
    driver: Rc<RefCell<Driver>>,
    frame_handle: Rc<Cell<Option<i32>>>,
    tick: TickSlot,
}

#[wasm_bindgen]
impl FluidApp {
    /// Build every program and field. `config_json` may be omitted or partial.
    #[wasm_bindgen(constructor)]
    pub fn new(gl: WebGl2RenderingContext, config_json: Option<String>) -> Result<FluidApp, JsValue> {
        let config = match config_json {
            Some(json) => SimulationConfig::from_json(&json).map_err(to_js)?,
            None => SimulationConfig::default(),
        };
        let backend = WebGlBackend::new(gl).map_err(to_js)?;
        let core = FluidCore::new(backend, config).map_err(to_js)?;

        Ok(Self {
            driver: Rc::new(RefCell::new(FrameDriver::new(core))),
            frame_handle: Rc::new(Cell::new(None)),
            tick: Rc::new(RefCell::new(None)),
        })
    }

    /// Seed the startup burst and begin the requestAnimationFrame loop
    pub fn start(&mut self) -> Result<(), JsValue> {
        if self.frame_handle.get().is_some() {
            return Ok(());
        }
        self.driver.borrow_mut().start().map_err(to_js)?;

        let driver = self.driver.clone();
        let handle = self.frame_handle.clone();
        let slot = self.tick.clone();
        let tick = Closure::wrap(Box::new(move || {
            let keep_going = match driver.borrow_mut().update() {
                Ok(next) => next,
                Err(e) => {
                    log::error!("frame failed, stopping the loop: {}", e);
                    false
                }
            };
            let next = if keep_going {
                slot.borrow().as_ref().and_then(|tick| request_frame(tick).ok())
            } else {
                None
            };
            handle.set(next);
        }) as Box<dyn FnMut()>);

        let id = request_frame(&tick)?;
        *self.tick.borrow_mut() = Some(tick);
        self.frame_handle.set(Some(id));
        Ok(())
    }

    /// Cancel the pending frame and release every GPU resource
    pub fn stop(&mut self) -> Result<(), JsValue> {
        if let Some(id) = self.frame_handle.take() {
            if let Some(window) = web_sys::window() {
                window.cancel_animation_frame(id)?;
            }
        }
        self.driver
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("stop() called from inside a frame"))?
            .stop();
        self.tick.borrow_mut().take();
        Ok(())
    }

    /// Run one frame by hand (for hosts that drive their own loop)
    pub fn update(&mut self) -> Result<bool, JsValue> {
        self.driver.borrow_mut().update().map_err(to_js)
    }

    #[wasm_bindgen(getter)]
    pub fn running(&self) -> bool {
        self.driver.borrow().is_running()
    }

    #[wasm_bindgen(getter)]
    pub fn frame(&self) -> u64 {
        self.driver.borrow().core().frame()
    }

    /// Pointer position in canvas pixels; the delta is derived from the last call
    pub fn pointer_move(&mut self, id: i32, x: f32, y: f32) {
        self.driver.borrow_mut().move_pointer(id, x, y);
    }

    /// Full pointer record as produced by the host's input layer
    #[allow(clippy::too_many_arguments)]
    pub fn pointer_splat(&mut self, id: i32, x: f32, y: f32, dx: f32, dy: f32, r: f32, g: f32, b: f32) {
        self.driver
            .borrow_mut()
            .update_pointer(id, x, y, dx, dy, Rgb::new(r, g, b));
    }

    /// Queue `count` random splats for the next frame
    pub fn queue_burst(&mut self, count: u32) {
        self.driver.borrow_mut().queue_random_burst(count);
    }

    pub fn config(&self) -> String {
        self.driver.borrow().core().config().to_json()
    }

    /// Apply a partial or full JSON config; fields are rebuilt when a tier size changes
    pub fn set_config(&mut self, json: &str) -> Result<(), JsValue> {
        let mut driver = self.driver.borrow_mut();
        let merged = merge_config(driver.core().config(), json).map_err(to_js)?;
        driver.core_mut().reconfigure(merged).map_err(to_js)
    }

    /// Enable or disable per-stage perf metrics (adds timing overhead when enabled)
    pub fn enable_perf_metrics(&mut self, enabled: bool) {
        self.driver.borrow_mut().core_mut().enable_perf_metrics(enabled);
    }

    /// Last frame's perf snapshot (zeros when perf disabled)
    pub fn get_perf_stats(&self) -> PerfStats {
        self.driver.borrow().core().get_perf_stats()
    }

    /// `callback(Float32Array [u, v, dx, dy, r, g, b, radius])` for every
    /// applied splat; `undefined` removes it
    pub fn set_splat_callback(&mut self, callback: Option<js_sys::Function>) {
        let mut driver = self.driver.borrow_mut();
        match callback {
            Some(f) => driver.core_mut().set_splat_observer(move |s: &Splat| {
                let c = s.color_delta;
                let data = [
                    s.position[0],
                    s.position[1],
                    s.velocity_delta[0],
                    s.velocity_delta[1],
                    c.r,
                    c.g,
                    c.b,
                    s.radius,
                ];
                let array = js_sys::Float32Array::from(&data[..]);
                if let Err(e) = f.call1(&JsValue::NULL, &array) {
                    log::warn!("splat callback threw: {:?}", e);
                }
            }),
            None => driver.core_mut().clear_splat_observer(),
        }
    }
}

/// Overlay a partial JSON object onto the current config
fn merge_config(current: &SimulationConfig, json: &str) -> Result<SimulationConfig, EngineError> {
    let mut base = serde_json::to_value(current)?;
    let patch: serde_json::Value = serde_json::from_str(json)?;
    if let (Some(base), Some(patch)) = (base.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            base.insert(key.clone(), value.clone());
        }
    }
    let merged: SimulationConfig = serde_json::from_value(base)?;
    merged.validate()?;
    Ok(merged)
}
