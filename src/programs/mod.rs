//! Stage programs
//!
//! Every stage program is compiled once when a simulation instance is built
//! and kept for its whole run. Uniform slots are resolved right after linking
//! and never queried again.

use std::collections::HashMap;

use crate::core::error::{EngineError, EngineResult};
use crate::gpu::shaders::{self, ShaderSource};
use crate::gpu::{GpuBackend, ProgramId, RenderTarget, UniformKind, UniformSlot, UniformValue};

/// A linked program plus its name -> slot table
#[derive(Debug)]
pub struct StageProgram {
    label: &'static str,
    id: ProgramId,
    slots: HashMap<String, (UniformSlot, UniformKind)>,
}

impl StageProgram {
    pub fn compile(
        backend: &mut impl GpuBackend,
        label: &'static str,
        vertex: &ShaderSource,
        fragment: &ShaderSource,
    ) -> EngineResult<Self> {
        let compiled = backend.compile_program(label, vertex, fragment)?;
        let slots = compiled
            .uniforms
            .into_iter()
            .map(|u| (u.name, (u.slot, u.kind)))
            .collect();

        Ok(Self { label, id: compiled.id, slots })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn uniform_kind(&self, name: &str) -> Option<UniformKind> {
        self.slots.get(name).map(|(_, kind)| *kind)
    }

    /// Fail with `UnknownUniform` unless every name resolved to a slot
    pub fn require(&self, names: &[&str]) -> EngineResult<()> {
        match names.iter().find(|n| !self.has_uniform(n)) {
            Some(missing) => Err(EngineError::UnknownUniform {
                program: self.label.to_string(),
                name: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    #[inline]
    pub fn bind(&self, backend: &mut impl GpuBackend) {
        backend.use_program(self.id);
    }

    // Setters write into the bound program. A name the linker dropped is
    // ignored, the same as writing to a null GL location.

    #[inline]
    fn set(&self, backend: &mut impl GpuBackend, name: &str, value: UniformValue) {
        if let Some((slot, _)) = self.slots.get(name) {
            backend.set_uniform(*slot, value);
        }
    }

    #[inline]
    pub fn set_float(&self, backend: &mut impl GpuBackend, name: &str, v: f32) {
        self.set(backend, name, UniformValue::Float(v));
    }

    #[inline]
    pub fn set_vec2(&self, backend: &mut impl GpuBackend, name: &str, v: [f32; 2]) {
        self.set(backend, name, UniformValue::Vec2(v));
    }

    #[inline]
    pub fn set_vec3(&self, backend: &mut impl GpuBackend, name: &str, v: [f32; 3]) {
        self.set(backend, name, UniformValue::Vec3(v));
    }

    #[inline]
    pub fn set_vec4(&self, backend: &mut impl GpuBackend, name: &str, v: [f32; 4]) {
        self.set(backend, name, UniformValue::Vec4(v));
    }

    #[inline]
    pub fn set_sampler(&self, backend: &mut impl GpuBackend, name: &str, unit: u32) {
        self.set(backend, name, UniformValue::Int(unit as i32));
    }

    pub fn release(self, backend: &mut impl GpuBackend) {
        backend.destroy_program(self.id);
    }
}

/// Full-screen quad rasterization into a target
#[derive(Debug, Default)]
pub struct Compositor {
    draws: u64,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn blit(&mut self, backend: &mut impl GpuBackend, target: RenderTarget) -> EngineResult<()> {
        backend.draw_quad(target)?;
        self.draws += 1;
        Ok(())
    }

    /// Draws issued since creation
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

/// Every stage program of one simulation instance
#[derive(Debug)]
pub struct ProgramSet {
    pub curl: StageProgram,
    pub vorticity: StageProgram,
    pub divergence: StageProgram,
    pub clear: StageProgram,
    pub pressure: StageProgram,
    pub gradient_subtract: StageProgram,
    pub advection: StageProgram,
    pub splat: StageProgram,
    pub color: StageProgram,
    pub background: StageProgram,
    pub display: StageProgram,
    manual_filtering: bool,
}

const STAGE_COUNT: usize = 11;

impl ProgramSet {
    /// Compile all stages. Any failure releases what was already built and
    /// aborts: the pipeline has no meaningful partial mode.
    pub fn build(backend: &mut impl GpuBackend, manual_filtering: bool) -> EngineResult<Self> {
        let advection_src = if manual_filtering {
            &shaders::ADVECTION_MANUAL_FILTERING
        } else {
            &shaders::ADVECTION
        };
        let advection_uniforms: &[&str] = if manual_filtering {
            &["uVelocity", "uSource", "texelSize", "dyeTexelSize", "dt", "dissipation"]
        } else {
            &["uVelocity", "uSource", "texelSize", "dt", "dissipation"]
        };

        let table: [(&'static str, &ShaderSource, &[&str]); STAGE_COUNT] = [
            ("curl", &shaders::CURL, &["uVelocity", "texelSize"]),
            ("vorticity", &shaders::VORTICITY, &["uVelocity", "uCurl", "curl", "dt", "texelSize"]),
            ("divergence", &shaders::DIVERGENCE, &["uVelocity", "texelSize"]),
            ("clear", &shaders::CLEAR, &["uTexture", "value"]),
            ("pressure", &shaders::PRESSURE, &["uPressure", "uDivergence", "texelSize"]),
            ("gradient_subtract", &shaders::GRADIENT_SUBTRACT, &["uPressure", "uVelocity", "texelSize"]),
            ("advection", advection_src, advection_uniforms),
            ("splat", &shaders::SPLAT, &["uTarget", "aspectRatio", "color", "point", "radius"]),
            ("color", &shaders::COLOR, &["color"]),
            ("background", &shaders::BACKGROUND, &["aspectRatio"]),
            ("display", &shaders::DISPLAY, &["uTexture", "texelSize"]),
        ];

        let mut built: Vec<StageProgram> = Vec::with_capacity(STAGE_COUNT);
        for (label, fragment, required) in table {
            let result = StageProgram::compile(backend, label, &shaders::BASE_VERTEX, fragment)
                .and_then(|program| match program.require(required) {
                    Ok(()) => Ok(program),
                    Err(e) => {
                        program.release(backend);
                        Err(e)
                    }
                });

            match result {
                Ok(program) => {
                    log::trace!("stage program '{}' linked as {:?}", program.label(), program.id());
                    built.push(program);
                }
                Err(e) => {
                    log::error!("stage program '{}' failed: {}", label, e);
                    for program in built {
                        program.release(backend);
                    }
                    return Err(e);
                }
            }
        }

        let programs: [StageProgram; STAGE_COUNT] = built
            .try_into()
            .map_err(|_| EngineError::Context("stage program table incomplete".to_string()))?;
        let [curl, vorticity, divergence, clear, pressure, gradient_subtract, advection, splat, color, background, display] =
            programs;

        log::debug!(
            "compiled {} stage programs (manual filtering: {})",
            STAGE_COUNT,
            manual_filtering
        );

        Ok(Self {
            curl,
            vorticity,
            divergence,
            clear,
            pressure,
            gradient_subtract,
            advection,
            splat,
            color,
            background,
            display,
            manual_filtering,
        })
    }

    /// Whether advection runs the four-tap manual bilinear kernel
    pub fn manual_filtering(&self) -> bool {
        self.manual_filtering
    }

    pub fn release(self, backend: &mut impl GpuBackend) {
        for program in [
            self.curl,
            self.vorticity,
            self.divergence,
            self.clear,
            self.pressure,
            self.gradient_subtract,
            self.advection,
            self.splat,
            self.color,
            self.background,
            self.display,
        ] {
            program.release(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::software::SoftwareBackend;
    use crate::gpu::{Kernel, ShaderStage};

    #[test]
    fn build_compiles_every_stage() {
        let mut gpu = SoftwareBackend::new(4, 4);
        let set = ProgramSet::build(&mut gpu, false).unwrap();
        assert_eq!(gpu.live_programs(), STAGE_COUNT);
        assert!(!set.manual_filtering());
        assert!(!set.advection.has_uniform("dyeTexelSize"));

        set.release(&mut gpu);
        assert_eq!(gpu.live_programs(), 0);
    }

    #[test]
    fn manual_filtering_selects_bilerp_advection() {
        let mut gpu = SoftwareBackend::new(4, 4);
        let set = ProgramSet::build(&mut gpu, true).unwrap();
        assert!(set.manual_filtering());
        assert_eq!(set.advection.uniform_kind("dyeTexelSize"), Some(UniformKind::Vec2));
    }

    #[test]
    fn slots_resolve_once_at_compile() {
        let mut gpu = SoftwareBackend::new(4, 4);
        let p = StageProgram::compile(&mut gpu, "splat", &shaders::BASE_VERTEX, &shaders::SPLAT).unwrap();
        assert_eq!(p.uniform_kind("uTarget"), Some(UniformKind::Sampler2D));
        assert_eq!(p.uniform_kind("color"), Some(UniformKind::Vec3));
        assert_eq!(p.uniform_kind("texelSize"), Some(UniformKind::Vec2));
        assert!(p.require(&["point", "radius"]).is_ok());
        assert!(matches!(
            p.require(&["nope"]),
            Err(EngineError::UnknownUniform { name, .. }) if name == "nope"
        ));
    }

    #[test]
    fn missing_uniform_aborts_build() {
        const BROKEN_CURL: ShaderSource = ShaderSource {
            label: "curl.frag",
            stage: ShaderStage::Fragment,
            kernel: Kernel::Curl,
            glsl: "uniform sampler2D uVel;\nvoid main () {}",
        };
        let mut gpu = SoftwareBackend::new(4, 4);
        let p = StageProgram::compile(&mut gpu, "curl", &shaders::BASE_VERTEX, &BROKEN_CURL).unwrap();
        assert!(p.require(&["uVelocity"]).is_err());
        p.release(&mut gpu);
        assert_eq!(gpu.live_programs(), 0);
    }

    #[test]
    fn compositor_counts_draws() {
        let mut gpu = SoftwareBackend::new(2, 2);
        let p = StageProgram::compile(&mut gpu, "color", &shaders::BASE_VERTEX, &shaders::COLOR).unwrap();
        p.bind(&mut gpu);
        p.set_vec4(&mut gpu, "color", [1.0, 0.0, 0.0, 1.0]);
        p.set_float(&mut gpu, "not_declared", 3.0);

        let mut compositor = Compositor::new();
        compositor.blit(&mut gpu, RenderTarget::Screen).unwrap();
        compositor.blit(&mut gpu, RenderTarget::Screen).unwrap();
        assert_eq!(compositor.draws(), 2);
        assert_eq!(gpu.read_surface().unwrap()[0], [1.0, 0.0, 0.0, 1.0]);
    }
}
