use crate::core::error::{EngineError, EngineResult};
use crate::core::field::{DoubleBuffer, FieldFormat, FilterMode, GridField, Resolution};
use crate::domain::SimulationConfig;
use crate::gpu::{GpuBackend, TextureId};
use crate::programs::{Compositor, ProgramSet};

use super::formats::{self, FieldFormats};
use super::perf_stats::PerfStats;
use super::random;
use super::{FieldSet, FluidCore};

const DEFAULT_SEED: u32 = 12345;

pub(super) fn create_fluid_core<B: GpuBackend>(
    mut backend: B,
    config: SimulationConfig,
) -> EngineResult<FluidCore<B>> {
    config.validate()?;

    let formats = formats::negotiate(backend.capabilities());
    let programs = ProgramSet::build(&mut backend, formats.manual_filtering)?;

    let surface = backend.surface_size();
    let (sim, dye) = tiers(&config, surface);
    let fields = match FieldSet::allocate(&mut backend, formats, sim, dye) {
        Ok(fields) => fields,
        Err(e) => {
            programs.release(&mut backend);
            return Err(e);
        }
    };

    log::info!(
        "fluid core ready: surface {}x{}, sim {}x{}, dye {}x{}, {:?} fields, {:?} filtering",
        surface.0,
        surface.1,
        sim.width,
        sim.height,
        dye.width,
        dye.height,
        formats.precision,
        formats.filter
    );

    Ok(FluidCore {
        backend,
        config,
        formats,
        programs: Some(programs),
        fields: Some(fields),
        compositor: Compositor::new(),
        surface,
        frame: 0,
        rng_state: random::seed_state(DEFAULT_SEED),
        splats_applied: 0,
        splats_dropped: 0,
        splat_observer: None,
        perf_enabled: false,
        perf_stats: PerfStats::default(),
    })
}

fn tiers(config: &SimulationConfig, surface: (u32, u32)) -> (Resolution, Resolution) {
    (
        Resolution::for_surface(config.sim_resolution, surface.0, surface.1),
        Resolution::for_surface(config.dye_resolution, surface.0, surface.1),
    )
}

impl FieldSet {
    /// Allocate every field, all or nothing: on any failure the textures
    /// created so far are destroyed before the error is returned.
    pub(super) fn allocate(
        backend: &mut impl GpuBackend,
        formats: FieldFormats,
        sim: Resolution,
        dye: Resolution,
    ) -> EngineResult<FieldSet> {
        let mut created: Vec<TextureId> = Vec::with_capacity(8);
        let result = allocate_tracked(backend, formats, sim, dye, &mut created);
        if result.is_err() {
            for texture in created {
                backend.destroy_texture(texture);
            }
        }
        result
    }

    pub(super) fn release(self, backend: &mut impl GpuBackend) {
        self.velocity.release(backend);
        self.density.release(backend);
        self.pressure.release(backend);
        self.curl.release(backend);
        self.divergence.release(backend);
    }
}

fn allocate_tracked(
    backend: &mut impl GpuBackend,
    formats: FieldFormats,
    sim: Resolution,
    dye: Resolution,
    created: &mut Vec<TextureId>,
) -> EngineResult<FieldSet> {
    let p = formats.precision;

    let density = tracked_double(backend, created, "density", dye, FieldFormat::rgba(p), formats.filter)?;
    let velocity = tracked_double(backend, created, "velocity", sim, FieldFormat::rg(p), formats.filter)?;
    let pressure = tracked_double(backend, created, "pressure", sim, FieldFormat::r(p), FilterMode::Nearest)?;

    let curl = GridField::create(backend, "curl", sim, FieldFormat::r(p), FilterMode::Nearest)?;
    created.push(curl.texture());
    let divergence = GridField::create(backend, "divergence", sim, FieldFormat::r(p), FilterMode::Nearest)?;
    created.push(divergence.texture());

    Ok(FieldSet { velocity, density, pressure, curl, divergence, sim, dye })
}

fn tracked_double(
    backend: &mut impl GpuBackend,
    created: &mut Vec<TextureId>,
    label: &str,
    resolution: Resolution,
    format: FieldFormat,
    filter: FilterMode,
) -> EngineResult<DoubleBuffer> {
    let buffer = DoubleBuffer::create(backend, label, resolution, format, filter)?;
    created.push(buffer.read().texture());
    created.push(buffer.write().texture());
    Ok(buffer)
}

pub(super) fn resize<B: GpuBackend>(core: &mut FluidCore<B>, width: u32, height: u32) -> EngineResult<bool> {
    if core.is_released() {
        return Err(EngineError::Released);
    }
    if width == 0 || height == 0 {
        log::debug!("ignoring resize to empty surface {}x{}", width, height);
        return Ok(false);
    }

    let (sim, dye) = tiers(&core.config, (width, height));
    let unchanged = core
        .fields
        .as_ref()
        .is_some_and(|f| f.sim == sim && f.dye == dye);
    if unchanged {
        core.surface = (width, height);
        return Ok(false);
    }

    let fields = FieldSet::allocate(&mut core.backend, core.formats, sim, dye).map_err(|e| {
        log::error!("resize to {}x{} failed, keeping previous fields: {}", width, height, e);
        e
    })?;
    if let Some(old) = core.fields.replace(fields) {
        old.release(&mut core.backend);
    }
    core.surface = (width, height);

    log::info!(
        "fields reallocated for {}x{}: sim {}x{}, dye {}x{}",
        width,
        height,
        sim.width,
        sim.height,
        dye.width,
        dye.height
    );
    Ok(true)
}

pub(super) fn reconfigure<B: GpuBackend>(core: &mut FluidCore<B>, config: SimulationConfig) -> EngineResult<()> {
    if core.is_released() {
        return Err(EngineError::Released);
    }
    config.validate()?;

    let (sim, dye) = tiers(&config, core.surface);
    let needs_fields = core
        .fields
        .as_ref()
        .map_or(true, |f| f.sim != sim || f.dye != dye);

    if needs_fields {
        let fields = FieldSet::allocate(&mut core.backend, core.formats, sim, dye)?;
        if let Some(old) = core.fields.replace(fields) {
            old.release(&mut core.backend);
        }
        log::info!("config changed tier sizes: sim {}x{}, dye {}x{}", sim.width, sim.height, dye.width, dye.height);
    }
    core.config = config;
    Ok(())
}

pub(super) fn release<B: GpuBackend>(core: &mut FluidCore<B>) {
    let had_resources = core.fields.is_some() || core.programs.is_some();
    if let Some(fields) = core.fields.take() {
        fields.release(&mut core.backend);
    }
    if let Some(programs) = core.programs.take() {
        programs.release(&mut core.backend);
    }
    if had_resources {
        log::info!("fluid core released after {} frames", core.frame);
    }
}
