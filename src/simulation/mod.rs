//! Fluid simulation
//!
//! [`FluidCore`] is the context object of one simulation run: the device, the
//! stage programs, every grid field and the solver settings. Stage logic lives
//! in the submodules and operates on the context:
//! - `init/`   - startup, format negotiation, field (re)allocation, settings
//! - `step/`   - the fixed-order solver pipeline
//! - `splat/`  - pointer and random-burst injection
//! - `render/` - compositing to the screen or a field
//! - `driver/` - the per-frame loop ([`FrameDriver`])
//!
//! Fields and programs are held as `Option` so that [`FluidCore::release`]
//! can hand them back to the device at a known point.

use crate::core::error::{EngineError, EngineResult};
use crate::core::field::{DoubleBuffer, GridField, Resolution};
use crate::core::math::Texel;
use crate::domain::{Rgb, SimulationConfig};
use crate::gpu::{GpuBackend, RenderTarget};
use crate::programs::{Compositor, ProgramSet};

#[path = "perf/perf_timer.rs"]
mod perf_timer;
#[path = "perf/perf_stats.rs"]
mod perf_stats;
#[path = "init/random.rs"]
mod random;
#[path = "init/formats.rs"]
mod formats;
#[path = "init/init.rs"]
mod init;
#[path = "init/settings.rs"]
mod settings;
#[path = "step/step.rs"]
mod step;
#[path = "splat/splat.rs"]
mod splat;
#[path = "render/render.rs"]
mod render;
#[path = "input/pointers.rs"]
mod pointers;
#[path = "driver/driver.rs"]
mod driver;

pub use driver::FrameDriver;
pub use formats::FieldFormats;
pub use perf_stats::PerfStats;
pub use pointers::Pointer;
pub use splat::{Splat, MAX_SPLAT_MAGNITUDE};

use perf_timer::PerfTimer;

/// Fixed solver timestep, an assumed ~60 Hz cadence
pub const DEFAULT_DT: f32 = 0.016;

/// Every grid field of one run, in two resolution tiers
#[derive(Debug)]
pub struct FieldSet {
    velocity: DoubleBuffer,
    density: DoubleBuffer,
    pressure: DoubleBuffer,
    curl: GridField,
    divergence: GridField,
    sim: Resolution,
    dye: Resolution,
}

impl FieldSet {
    pub fn velocity(&self) -> &DoubleBuffer {
        &self.velocity
    }

    pub fn density(&self) -> &DoubleBuffer {
        &self.density
    }

    pub fn pressure(&self) -> &DoubleBuffer {
        &self.pressure
    }

    pub fn curl(&self) -> &GridField {
        &self.curl
    }

    pub fn divergence(&self) -> &GridField {
        &self.divergence
    }

    /// Tier of velocity, curl, divergence and pressure
    pub fn sim_resolution(&self) -> Resolution {
        self.sim
    }

    /// Tier of the dye
    pub fn dye_resolution(&self) -> Resolution {
        self.dye
    }

    pub fn byte_size(&self) -> usize {
        self.velocity.byte_size()
            + self.density.byte_size()
            + self.pressure.byte_size()
            + self.curl.byte_size()
            + self.divergence.byte_size()
    }
}

/// Selects a field for readback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Velocity,
    Density,
    Pressure,
    Curl,
    Divergence,
}

/// Disjoint borrows of a live context, handed to stage functions
pub(crate) struct Parts<'a, B: GpuBackend> {
    pub(crate) backend: &'a mut B,
    pub(crate) programs: &'a ProgramSet,
    pub(crate) fields: &'a mut FieldSet,
    pub(crate) compositor: &'a mut Compositor,
    pub(crate) config: &'a SimulationConfig,
}

/// Simulation context
pub struct FluidCore<B: GpuBackend> {
    backend: B,
    config: SimulationConfig,
    formats: FieldFormats,
    programs: Option<ProgramSet>,
    fields: Option<FieldSet>,
    compositor: Compositor,

    // Display surface the tiers were sized for
    surface: (u32, u32),

    // State
    frame: u64,
    rng_state: u32,
    splats_applied: u64,
    splats_dropped: u64,
    splat_observer: Option<Box<dyn FnMut(&Splat)>>,

    // Perf metrics
    perf_enabled: bool,
    perf_stats: PerfStats,
}

impl<B: GpuBackend> FluidCore<B> {
    /// Validate the config, negotiate formats, compile every stage program and
    /// allocate all fields for the device's current surface.
    pub fn new(backend: B, config: SimulationConfig) -> EngineResult<Self> {
        init::create_fluid_core(backend, config)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn formats(&self) -> FieldFormats {
        self.formats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// `None` once released
    pub fn fields(&self) -> Option<&FieldSet> {
        self.fields.as_ref()
    }

    pub fn programs(&self) -> Option<&ProgramSet> {
        self.programs.as_ref()
    }

    pub fn is_released(&self) -> bool {
        self.programs.is_none() || self.fields.is_none()
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn splats_applied(&self) -> u64 {
        self.splats_applied
    }

    /// Splats rejected as malformed
    pub fn splats_dropped(&self) -> u64 {
        self.splats_dropped
    }

    /// Draws issued through the compositor
    pub fn draw_count(&self) -> u64 {
        self.compositor.draws()
    }

    /// Enable or disable per-stage perf metrics (adds timing overhead when enabled)
    pub fn enable_perf_metrics(&mut self, enabled: bool) {
        settings::enable_perf_metrics(self, enabled);
    }

    /// Last frame's perf snapshot (zeros when perf disabled)
    pub fn get_perf_stats(&self) -> PerfStats {
        settings::get_perf_stats(self)
    }

    /// Reseed the burst generator
    pub fn set_seed(&mut self, seed: u32) {
        settings::set_seed(self, seed);
    }

    /// Callback invoked with every applied splat
    pub fn set_splat_observer(&mut self, observer: impl FnMut(&Splat) + 'static) {
        settings::set_splat_observer(self, Some(Box::new(observer)));
    }

    pub fn clear_splat_observer(&mut self) {
        settings::set_splat_observer(self, None);
    }

    // === Injection ===

    /// Inject a splat given in normalized coordinates. Returns `false` when
    /// the splat was malformed and dropped (see [`Splat::is_well_formed`]).
    pub fn apply_splat(&mut self, splat: &Splat) -> EngineResult<bool> {
        splat::apply_splat(self, splat)
    }

    /// Inject a pointer motion given in surface pixels (y down)
    pub fn apply_pointer_splat(&mut self, x: f32, y: f32, dx: f32, dy: f32, color: Rgb) -> EngineResult<bool> {
        splat::apply_pointer_splat(self, x, y, dx, dy, color)
    }

    /// `count` splats at random positions with random velocity and bright color
    pub fn apply_random_burst(&mut self, count: u32) -> EngineResult<()> {
        splat::apply_random_burst(self, count)
    }

    /// The startup burst: 5 to 24 random splats
    pub fn seed_startup_burst(&mut self) -> EngineResult<u32> {
        splat::seed_startup_burst(self)
    }

    // === Solver ===

    /// One full solver step
    pub fn step(&mut self, dt: f32) -> EngineResult<()> {
        step::step(self, dt)
    }

    /// velocity -> curl
    pub fn compute_curl(&mut self) -> EngineResult<()> {
        step::curl_pass(self)
    }

    /// velocity + curl -> velocity
    pub fn apply_vorticity(&mut self, dt: f32) -> EngineResult<()> {
        step::vorticity_pass(self, dt)
    }

    /// velocity -> divergence
    pub fn compute_divergence(&mut self) -> EngineResult<()> {
        step::divergence_pass(self)
    }

    /// pressure *= pressureDissipation
    pub fn decay_pressure(&mut self) -> EngineResult<()> {
        step::pressure_decay_pass(self)
    }

    /// `iterations` Jacobi relaxations of pressure against divergence
    pub fn solve_pressure(&mut self, iterations: u32) -> EngineResult<()> {
        step::pressure_solve_pass(self, iterations)
    }

    /// velocity -= grad(pressure)
    pub fn subtract_gradient(&mut self) -> EngineResult<()> {
        step::gradient_subtract_pass(self)
    }

    /// Self-advect velocity, then advect dye on the dye tier
    pub fn advect(&mut self, dt: f32) -> EngineResult<()> {
        step::advection_pass(self, dt)
    }

    // === Output ===

    /// Composite the dye into `target`
    pub fn render(&mut self, target: RenderTarget) -> EngineResult<()> {
        render::render(self, target)
    }

    /// Copy a field's read side back from the device
    pub fn read_field(&self, kind: FieldKind) -> EngineResult<Vec<Texel>> {
        let fields = self.fields.as_ref().ok_or(EngineError::Released)?;
        let texture = match kind {
            FieldKind::Velocity => fields.velocity.read().texture(),
            FieldKind::Density => fields.density.read().texture(),
            FieldKind::Pressure => fields.pressure.read().texture(),
            FieldKind::Curl => fields.curl.texture(),
            FieldKind::Divergence => fields.divergence.texture(),
        };
        self.backend.read_texture(texture)
    }

    pub fn read_surface(&self) -> EngineResult<Vec<Texel>> {
        self.backend.read_surface()
    }

    // === Lifecycle ===

    /// Reallocate both tiers for a new surface size. On failure the old fields
    /// stay in place untouched. Returns whether anything was reallocated.
    pub fn resize(&mut self, width: u32, height: u32) -> EngineResult<bool> {
        init::resize(self, width, height)
    }

    /// Swap in a new config; fields are rebuilt when a tier size changes.
    /// On failure the previous config and fields stay active.
    pub fn reconfigure(&mut self, config: SimulationConfig) -> EngineResult<()> {
        init::reconfigure(self, config)
    }

    /// Release every field and program. Later solver calls fail with `Released`.
    pub fn release(&mut self) {
        init::release(self);
    }

    pub(crate) fn parts(&mut self) -> EngineResult<Parts<'_, B>> {
        let FluidCore { backend, programs, fields, compositor, config, .. } = self;
        match (programs.as_ref(), fields.as_mut()) {
            (Some(programs), Some(fields)) => Ok(Parts { backend, programs, fields, compositor, config }),
            _ => Err(EngineError::Released),
        }
    }

    pub(crate) fn next_random(&mut self) -> f32 {
        random::next_f32(&mut self.rng_state)
    }
}

#[cfg(test)]
#[path = "tests/tests.rs"]
mod tests;
