use crate::core::error::EngineResult;
use crate::core::field::Resolution;
use crate::gpu::{BlendMode, GpuBackend, RenderTarget};

use super::{FluidCore, Parts, PerfTimer};

/// Composite the dye into `target`.
///
/// An opaque background is filled with the configured color first. A
/// transparent one gets the radial gradient, but only on the screen: an
/// offscreen field keeps the raw dye for the next consumer.
pub(super) fn render<B: GpuBackend>(core: &mut FluidCore<B>, target: RenderTarget) -> EngineResult<()> {
    let timer = core.perf_enabled.then(PerfTimer::start);
    let (sw, sh) = core.surface;

    let Parts { backend, programs, fields, compositor, config } = core.parts()?;
    let opaque = !config.transparent_background;
    let to_screen = target == RenderTarget::Screen;

    let (width, height) = if to_screen { (sw, sh) } else { (fields.dye.width, fields.dye.height) };
    backend.set_blend(if to_screen || opaque { BlendMode::PremultipliedOver } else { BlendMode::Disabled });
    backend.set_viewport(width, height);

    if opaque {
        programs.color.bind(backend);
        programs.color.set_vec4(backend, "color", config.background_rgba());
        compositor.blit(backend, target)?;
    } else if to_screen {
        let aspect = Resolution::new(width, height).aspect();
        programs.background.bind(backend);
        programs.background.set_float(backend, "aspectRatio", aspect);
        compositor.blit(backend, target)?;
    }

    let display = &programs.display;
    display.bind(backend);
    display.set_vec2(backend, "texelSize", [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32]);
    let density = fields.density.read().attach(backend, 0);
    display.set_sampler(backend, "uTexture", density);
    compositor.blit(backend, target)?;

    if let Some(t) = timer {
        core.perf_stats.render_ms = t.elapsed_ms();
    }
    Ok(())
}
