//! Splat injection
//!
//! A splat adds a gaussian blob of velocity at the sim tier and of dye color
//! at the dye tier. Positions are normalized with y up; pointer input arrives
//! in surface pixels with y down and is converted here.

use crate::core::error::EngineResult;
use crate::core::field::Resolution;
use crate::domain::{generate_color, Rgb};
use crate::gpu::{BlendMode, GpuBackend};

use super::{FluidCore, Parts, PerfTimer};

/// Bright random dye multiplier for bursts
const BURST_COLOR_GAIN: f32 = 10.0;
/// Burst velocity range per axis, in pixels per step
const BURST_VELOCITY: f32 = 1000.0;
/// Largest velocity, color or radius component a splat may carry
pub const MAX_SPLAT_MAGNITUDE: f32 = 1.0e6;

/// One injection
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    /// Center in [0, 1]², y up
    pub position: [f32; 2],
    /// Velocity added at the center, y up
    pub velocity_delta: [f32; 2],
    pub color_delta: Rgb,
    /// Gaussian falloff radius in UV units
    pub radius: f32,
}

impl Splat {
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.velocity_delta.iter().all(|v| v.is_finite())
            && self.color_delta.is_finite()
            && self.radius.is_finite()
    }

    /// Finite, within [`MAX_SPLAT_MAGNITUDE`], and with a radius whose square
    /// is a normal positive float so the falloff never divides by zero
    pub fn is_well_formed(&self) -> bool {
        let [r, g, b] = self.color_delta.to_array();
        self.is_finite()
            && self.radius > 0.0
            && (self.radius * self.radius).is_normal()
            && [self.velocity_delta[0], self.velocity_delta[1], r, g, b, self.radius]
                .iter()
                .all(|v| v.abs() <= MAX_SPLAT_MAGNITUDE)
    }
}

pub(super) fn apply_splat<B: GpuBackend>(core: &mut FluidCore<B>, splat: &Splat) -> EngineResult<bool> {
    if !splat.is_well_formed() {
        core.splats_dropped += 1;
        if core.perf_enabled {
            core.perf_stats.splats_dropped += 1;
        }
        log::warn!("dropping malformed splat: {:?}", splat);
        return Ok(false);
    }

    let timer = core.perf_enabled.then(PerfTimer::start);
    let (w, h) = core.surface;
    let aspect = Resolution::new(w, h).aspect();

    let Parts { backend, programs, fields, compositor, .. } = core.parts()?;
    let program = &programs.splat;
    backend.set_blend(BlendMode::Disabled);
    program.bind(backend);
    program.set_float(backend, "aspectRatio", aspect);
    program.set_vec2(backend, "point", splat.position);
    program.set_float(backend, "radius", splat.radius);

    let sim = fields.sim;
    backend.set_viewport(sim.width, sim.height);
    program.set_vec2(backend, "texelSize", sim.texel_size());
    let velocity = fields.velocity.read().attach(backend, 0);
    program.set_sampler(backend, "uTarget", velocity);
    let [dx, dy] = splat.velocity_delta;
    program.set_vec3(backend, "color", [dx, dy, 1.0]);
    compositor.blit(backend, fields.velocity.write().target())?;
    fields.velocity.swap();

    let dye = fields.dye;
    backend.set_viewport(dye.width, dye.height);
    program.set_vec2(backend, "texelSize", dye.texel_size());
    let density = fields.density.read().attach(backend, 0);
    program.set_sampler(backend, "uTarget", density);
    program.set_vec3(backend, "color", splat.color_delta.to_array());
    compositor.blit(backend, fields.density.write().target())?;
    fields.density.swap();

    core.splats_applied += 1;
    if let Some(t) = timer {
        core.perf_stats.splat_ms += t.elapsed_ms();
        core.perf_stats.splats_applied += 1;
    }
    if let Some(observer) = core.splat_observer.as_mut() {
        observer(splat);
    }
    Ok(true)
}

pub(super) fn apply_pointer_splat<B: GpuBackend>(
    core: &mut FluidCore<B>,
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
    color: Rgb,
) -> EngineResult<bool> {
    let (w, h) = core.surface;
    let (w, h) = (w.max(1) as f32, h.max(1) as f32);
    let splat = Splat {
        position: [x / w, 1.0 - y / h],
        velocity_delta: [dx, -dy],
        color_delta: color,
        radius: core.config.splat_radius_uv(),
    };
    apply_splat(core, &splat)
}

pub(super) fn apply_random_burst<B: GpuBackend>(core: &mut FluidCore<B>, count: u32) -> EngineResult<()> {
    let (w, h) = core.surface;
    for _ in 0..count {
        let color = generate_color(&mut || core.next_random()).scaled(BURST_COLOR_GAIN);
        let x = w as f32 * core.next_random();
        let y = h as f32 * core.next_random();
        let dx = BURST_VELOCITY * (core.next_random() - 0.5);
        let dy = BURST_VELOCITY * (core.next_random() - 0.5);
        apply_pointer_splat(core, x, y, dx, dy, color)?;
    }
    Ok(())
}

/// Returns how many splats were injected
pub(super) fn seed_startup_burst<B: GpuBackend>(core: &mut FluidCore<B>) -> EngineResult<u32> {
    let count = (core.next_random() * 20.0) as u32 + 5;
    apply_random_burst(core, count)?;
    log::debug!("startup burst of {} splats", count);
    Ok(count)
}
