//! Solver pipeline
//!
//! One `step` runs, strictly in this order: curl, vorticity confinement,
//! divergence, pressure decay, Jacobi pressure solve, gradient subtraction,
//! velocity self-advection, dye advection. Everything but the dye advection
//! runs on the sim tier. Each pass binds its own program, viewport and units,
//! so passes can also be driven one at a time.

use crate::core::error::EngineResult;
use crate::gpu::{BlendMode, GpuBackend};

use super::{FluidCore, Parts, PerfTimer};

pub(super) fn step<B: GpuBackend>(core: &mut FluidCore<B>, dt: f32) -> EngineResult<()> {
    let perf_on = core.perf_enabled;
    let iterations = core.config.pressure_iterations;
    let step_start = if perf_on { Some(PerfTimer::start()) } else { None };
    let mut lap = step_start;

    curl_pass(core)?;
    if let Some(t) = lap.as_mut() {
        core.perf_stats.curl_ms = t.lap_ms();
    }

    vorticity_pass(core, dt)?;
    if let Some(t) = lap.as_mut() {
        core.perf_stats.vorticity_ms = t.lap_ms();
    }

    divergence_pass(core)?;
    if let Some(t) = lap.as_mut() {
        core.perf_stats.divergence_ms = t.lap_ms();
    }

    pressure_decay_pass(core)?;
    pressure_solve_pass(core, iterations)?;
    if let Some(t) = lap.as_mut() {
        core.perf_stats.pressure_ms = t.lap_ms();
        core.perf_stats.pressure_iterations = iterations;
    }

    gradient_subtract_pass(core)?;
    if let Some(t) = lap.as_mut() {
        core.perf_stats.gradient_ms = t.lap_ms();
    }

    advection_pass(core, dt)?;
    if let Some(t) = lap.as_mut() {
        core.perf_stats.advection_ms = t.lap_ms();
    }

    if let Some(t0) = step_start {
        core.perf_stats.step_ms = t0.elapsed_ms();
        core.perf_stats.draw_calls = core.compositor.draws() as u32;
        core.perf_stats.field_bytes = core.fields.as_ref().map_or(0, |f| f.byte_size()) as u32;
    }
    core.frame += 1;
    Ok(())
}

/// Bind the sim viewport with blending off
#[inline]
fn begin_sim_pass<B: GpuBackend>(parts: &mut Parts<'_, B>) -> [f32; 2] {
    let sim = parts.fields.sim;
    parts.backend.set_blend(BlendMode::Disabled);
    parts.backend.set_viewport(sim.width, sim.height);
    sim.texel_size()
}

pub(super) fn curl_pass<B: GpuBackend>(core: &mut FluidCore<B>) -> EngineResult<()> {
    let mut parts = core.parts()?;
    let texel_size = begin_sim_pass(&mut parts);
    let Parts { backend, programs, fields, compositor, .. } = parts;
    let program = &programs.curl;

    program.bind(backend);
    program.set_vec2(backend, "texelSize", texel_size);
    let velocity = fields.velocity.read().attach(backend, 0);
    program.set_sampler(backend, "uVelocity", velocity);
    compositor.blit(backend, fields.curl.target())
}

pub(super) fn vorticity_pass<B: GpuBackend>(core: &mut FluidCore<B>, dt: f32) -> EngineResult<()> {
    let mut parts = core.parts()?;
    let texel_size = begin_sim_pass(&mut parts);
    let Parts { backend, programs, fields, compositor, config } = parts;
    let program = &programs.vorticity;

    program.bind(backend);
    program.set_vec2(backend, "texelSize", texel_size);
    let velocity = fields.velocity.read().attach(backend, 0);
    program.set_sampler(backend, "uVelocity", velocity);
    let curl = fields.curl.attach(backend, 1);
    program.set_sampler(backend, "uCurl", curl);
    program.set_float(backend, "curl", config.curl_strength);
    program.set_float(backend, "dt", dt);
    compositor.blit(backend, fields.velocity.write().target())?;
    fields.velocity.swap();
    Ok(())
}

pub(super) fn divergence_pass<B: GpuBackend>(core: &mut FluidCore<B>) -> EngineResult<()> {
    let mut parts = core.parts()?;
    let texel_size = begin_sim_pass(&mut parts);
    let Parts { backend, programs, fields, compositor, .. } = parts;
    let program = &programs.divergence;

    program.bind(backend);
    program.set_vec2(backend, "texelSize", texel_size);
    let velocity = fields.velocity.read().attach(backend, 0);
    program.set_sampler(backend, "uVelocity", velocity);
    compositor.blit(backend, fields.divergence.target())
}

pub(super) fn pressure_decay_pass<B: GpuBackend>(core: &mut FluidCore<B>) -> EngineResult<()> {
    let mut parts = core.parts()?;
    begin_sim_pass(&mut parts);
    let Parts { backend, programs, fields, compositor, config } = parts;
    let program = &programs.clear;

    program.bind(backend);
    let pressure = fields.pressure.read().attach(backend, 0);
    program.set_sampler(backend, "uTexture", pressure);
    program.set_float(backend, "value", config.pressure_dissipation);
    compositor.blit(backend, fields.pressure.write().target())?;
    fields.pressure.swap();
    Ok(())
}

/// Each iteration reads the previous iteration's output
pub(super) fn pressure_solve_pass<B: GpuBackend>(core: &mut FluidCore<B>, iterations: u32) -> EngineResult<()> {
    let mut parts = core.parts()?;
    let texel_size = begin_sim_pass(&mut parts);
    let Parts { backend, programs, fields, compositor, .. } = parts;
    let program = &programs.pressure;

    program.bind(backend);
    program.set_vec2(backend, "texelSize", texel_size);
    let divergence = fields.divergence.attach(backend, 0);
    program.set_sampler(backend, "uDivergence", divergence);
    for _ in 0..iterations {
        let pressure = fields.pressure.read().attach(backend, 1);
        program.set_sampler(backend, "uPressure", pressure);
        compositor.blit(backend, fields.pressure.write().target())?;
        fields.pressure.swap();
    }
    Ok(())
}

pub(super) fn gradient_subtract_pass<B: GpuBackend>(core: &mut FluidCore<B>) -> EngineResult<()> {
    let mut parts = core.parts()?;
    let texel_size = begin_sim_pass(&mut parts);
    let Parts { backend, programs, fields, compositor, .. } = parts;
    let program = &programs.gradient_subtract;

    program.bind(backend);
    program.set_vec2(backend, "texelSize", texel_size);
    let pressure = fields.pressure.read().attach(backend, 0);
    program.set_sampler(backend, "uPressure", pressure);
    let velocity = fields.velocity.read().attach(backend, 1);
    program.set_sampler(backend, "uVelocity", velocity);
    compositor.blit(backend, fields.velocity.write().target())?;
    fields.velocity.swap();
    Ok(())
}

/// Velocity advects itself on the sim tier, then carries the dye on the dye
/// tier. The backtrace always scales by the sim texel size.
pub(super) fn advection_pass<B: GpuBackend>(core: &mut FluidCore<B>, dt: f32) -> EngineResult<()> {
    let mut parts = core.parts()?;
    let texel_size = begin_sim_pass(&mut parts);
    let manual = parts.programs.manual_filtering();
    let Parts { backend, programs, fields, compositor, config } = parts;
    let program = &programs.advection;

    program.bind(backend);
    program.set_vec2(backend, "texelSize", texel_size);
    if manual {
        program.set_vec2(backend, "dyeTexelSize", texel_size);
    }
    let velocity = fields.velocity.read().attach(backend, 0);
    program.set_sampler(backend, "uVelocity", velocity);
    program.set_sampler(backend, "uSource", velocity);
    program.set_float(backend, "dt", dt);
    program.set_float(backend, "dissipation", config.velocity_dissipation);
    compositor.blit(backend, fields.velocity.write().target())?;
    fields.velocity.swap();

    let dye = fields.dye;
    backend.set_viewport(dye.width, dye.height);
    if manual {
        program.set_vec2(backend, "dyeTexelSize", dye.texel_size());
    }
    let velocity = fields.velocity.read().attach(backend, 0);
    program.set_sampler(backend, "uVelocity", velocity);
    let density = fields.density.read().attach(backend, 1);
    program.set_sampler(backend, "uSource", density);
    program.set_float(backend, "dissipation", config.density_dissipation);
    compositor.blit(backend, fields.density.write().target())?;
    fields.density.swap();
    Ok(())
}
