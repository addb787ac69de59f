//! CPU reference device
//!
//! Implements [`GpuBackend`] by evaluating each stage kernel per texel. Rows
//! of a draw are shaded in parallel with rayon when the `parallel` feature is
//! on. Storage honors the field format: values are rounded to the field
//! precision on write, missing channels read back as `(.., 0, 0, 1)`, and
//! filtering follows the texture's filter mode with clamp-to-edge wrapping.
//!
//! The screen is an 8-bit RGBA surface, so composited frames can be read back
//! the way a canvas would present them.

mod compile;
mod kernels;
mod sampler;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::error::{EngineError, EngineResult};
use crate::core::field::{FieldFormat, FilterMode, Precision, Resolution};
use crate::core::math::{Texel, Vec2};
use crate::gpu::{
    ActiveUniform, BlendMode, Capabilities, CompiledProgram, GpuBackend, Kernel, ProgramId,
    RenderTarget, ShaderSource, ShaderStage, TextureDesc, TextureId, UniformKind, UniformSlot,
    UniformValue, MAX_TEXTURE_UNITS,
};

use kernels::{Bindings, Varyings};
use sampler::SamplerView;

/// Largest texture edge accepted, matching common `MAX_TEXTURE_SIZE`
pub const MAX_TEXTURE_SIZE: u32 = 8192;

const SURFACE_FORMAT: FieldFormat = FieldFormat::rgba(Precision::Byte);

struct SoftTexture {
    label: String,
    resolution: Resolution,
    format: FieldFormat,
    filter: FilterMode,
    texels: Vec<Texel>,
}

impl SoftTexture {
    fn byte_size(&self) -> usize {
        self.resolution.texel_count() * self.format.bytes_per_texel()
    }
}

pub(super) struct SoftProgram {
    label: String,
    kernel: Kernel,
    uniforms: Vec<ActiveUniform>,
    values: Vec<Option<UniformValue>>,
}

impl SoftProgram {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.uniforms.iter().position(|u| u.name == name)
    }

    pub(super) fn declares(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub(super) fn value(&self, name: &str) -> Option<UniformValue> {
        self.index_of(name).and_then(|i| self.values[i])
    }

    /// Texture units read by this program's sampler uniforms
    fn sampled_units(&self) -> impl Iterator<Item = u32> + '_ {
        self.uniforms
            .iter()
            .zip(&self.values)
            .filter(|(u, _)| u.kind == UniformKind::Sampler2D)
            .map(|(_, v)| match v {
                Some(UniformValue::Int(unit)) if *unit >= 0 => *unit as u32,
                _ => 0,
            })
    }
}

/// Offscreen CPU device
pub struct SoftwareBackend {
    textures: Vec<Option<SoftTexture>>,
    programs: Vec<Option<SoftProgram>>,
    current: Option<ProgramId>,
    units: [Option<TextureId>; MAX_TEXTURE_UNITS as usize],
    viewport: (u32, u32),
    blend: BlendMode,
    surface: Resolution,
    surface_texels: Vec<Texel>,
    capabilities: Capabilities,
    memory_budget: Option<usize>,
    allocated_bytes: usize,
    draw_calls: u64,
}

impl SoftwareBackend {
    /// Device with a `width` x `height` screen surface and full float support
    pub fn new(width: u32, height: u32) -> Self {
        let surface = Resolution::new(width.max(1), height.max(1));
        Self {
            textures: Vec::new(),
            programs: Vec::new(),
            current: None,
            units: [None; MAX_TEXTURE_UNITS as usize],
            viewport: (surface.width, surface.height),
            blend: BlendMode::Disabled,
            surface,
            surface_texels: vec![[0.0; 4]; surface.texel_count()],
            capabilities: Capabilities::full(),
            memory_budget: None,
            allocated_bytes: 0,
            draw_calls: 0,
        }
    }

    /// Pretend to be a device with narrower float support
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Cap on texture memory; allocations past it fail like an out-of-memory device
    pub fn set_memory_budget(&mut self, budget: Option<usize>) {
        self.memory_budget = budget;
    }

    /// Resize the screen surface (a canvas resize). Contents are cleared.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface = Resolution::new(width.max(1), height.max(1));
        self.surface_texels = vec![[0.0; 4]; self.surface.texel_count()];
    }

    pub fn live_textures(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.iter().filter(|p| p.is_some()).count()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    pub fn texture_label(&self, texture: TextureId) -> Option<&str> {
        self.texture(texture).ok().map(|t| t.label.as_str())
    }

    /// Overwrite a texture's contents, quantized to its format
    pub fn upload(&mut self, texture: TextureId, texels: &[Texel]) -> EngineResult<()> {
        let tex = self.texture_mut(texture)?;
        if texels.len() != tex.texels.len() {
            return Err(EngineError::Allocation {
                label: tex.label.clone(),
                reason: format!("upload of {} texels into {}", texels.len(), tex.texels.len()),
            });
        }
        let format = tex.format;
        for (dst, src) in tex.texels.iter_mut().zip(texels) {
            *dst = store(format, *src);
        }
        Ok(())
    }

    fn texture(&self, id: TextureId) -> EngineResult<&SoftTexture> {
        self.textures
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(EngineError::UnknownTexture(id))
    }

    fn texture_mut(&mut self, id: TextureId) -> EngineResult<&mut SoftTexture> {
        self.textures
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(EngineError::UnknownTexture(id))
    }

    fn current_program(&self) -> EngineResult<&SoftProgram> {
        self.current
            .and_then(|id| self.programs.get(id.0 as usize))
            .and_then(Option::as_ref)
            .ok_or_else(|| EngineError::Context("draw without a bound program".to_string()))
    }
}

/// Round to the format and fill the channels it does not store
#[inline]
fn store(format: FieldFormat, v: Texel) -> Texel {
    let p = format.precision;
    match format.channels {
        1 => [p.quantize(v[0]), 0.0, 0.0, 1.0],
        2 => [p.quantize(v[0]), p.quantize(v[1]), 0.0, 1.0],
        3 => [p.quantize(v[0]), p.quantize(v[1]), p.quantize(v[2]), 1.0],
        _ => [p.quantize(v[0]), p.quantize(v[1]), p.quantize(v[2]), p.quantize(v[3])],
    }
}

#[inline]
fn blend_over(src: Texel, dst: Texel) -> Texel {
    let k = 1.0 - src[3];
    [
        src[0] + dst[0] * k,
        src[1] + dst[1] * k,
        src[2] + dst[2] * k,
        src[3] + dst[3] * k,
    ]
}

/// Shade one row of the target in place
#[inline]
#[allow(clippy::too_many_arguments)]
fn shade_row(
    y: usize,
    row: &mut [Texel],
    draw_width: usize,
    viewport: (u32, u32),
    texel_size: Vec2,
    kernel: &kernels::KernelFn<'_>,
    blend: BlendMode,
    format: FieldFormat,
) {
    let vy = (y as f32 + 0.5) / viewport.1 as f32;
    for x in 0..draw_width {
        let uv = Vec2::new((x as f32 + 0.5) / viewport.0 as f32, vy);
        let mut out = kernel(&Varyings::new(uv, texel_size));
        if blend == BlendMode::PremultipliedOver {
            out = blend_over(out, texel!(row, [x]));
        }
        texel!(row, [x] = store(format, out));
    }
}

impl GpuBackend for SoftwareBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> EngineResult<TextureId> {
        let res = desc.resolution;
        if !res.is_valid() {
            return Err(EngineError::InvalidResolution {
                width: res.width,
                height: res.height,
            });
        }
        if res.width > MAX_TEXTURE_SIZE || res.height > MAX_TEXTURE_SIZE {
            return Err(EngineError::Allocation {
                label: desc.label.to_string(),
                reason: format!(
                    "{}x{} exceeds max texture size {}",
                    res.width, res.height, MAX_TEXTURE_SIZE
                ),
            });
        }
        if !self.capabilities.support(desc.format.precision).renderable {
            return Err(EngineError::Allocation {
                label: desc.label.to_string(),
                reason: format!("{:?} targets are not renderable", desc.format.precision),
            });
        }

        let bytes = res.texel_count() * desc.format.bytes_per_texel();
        if let Some(budget) = self.memory_budget {
            if self.allocated_bytes + bytes > budget {
                return Err(EngineError::Allocation {
                    label: desc.label.to_string(),
                    reason: format!(
                        "out of memory: {} bytes requested, {} of {} in use",
                        bytes, self.allocated_bytes, budget
                    ),
                });
            }
        }

        let texture = SoftTexture {
            label: desc.label.to_string(),
            resolution: res,
            format: desc.format,
            filter: desc.filter,
            texels: vec![store(desc.format, [0.0; 4]); res.texel_count()],
        };
        self.allocated_bytes += bytes;

        let id = match self.textures.iter().position(Option::is_none) {
            Some(slot) => {
                self.textures[slot] = Some(texture);
                slot
            }
            None => {
                self.textures.push(Some(texture));
                self.textures.len() - 1
            }
        };
        Ok(TextureId(id as u32))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        let Some(slot) = self.textures.get_mut(texture.0 as usize) else {
            return;
        };
        if let Some(tex) = slot.take() {
            self.allocated_bytes = self.allocated_bytes.saturating_sub(tex.byte_size());
            for unit in self.units.iter_mut() {
                if *unit == Some(texture) {
                    *unit = None;
                }
            }
        }
    }

    fn compile_program(
        &mut self,
        label: &str,
        vertex: &ShaderSource,
        fragment: &ShaderSource,
    ) -> EngineResult<CompiledProgram> {
        let vs = compile::reflect(vertex, ShaderStage::Vertex)?;
        let fs = compile::reflect(fragment, ShaderStage::Fragment)?;
        let merged = compile::link(label, vs, fs)?;

        let uniforms: Vec<ActiveUniform> = merged
            .into_iter()
            .enumerate()
            .map(|(i, (name, kind))| ActiveUniform {
                name,
                kind,
                slot: UniformSlot(i as u32),
            })
            .collect();

        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(Some(SoftProgram {
            label: label.to_string(),
            kernel: fragment.kernel,
            values: vec![None; uniforms.len()],
            uniforms: uniforms.clone(),
        }));

        Ok(CompiledProgram { id, uniforms })
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if let Some(slot) = self.programs.get_mut(program.0 as usize) {
            *slot = None;
        }
        if self.current == Some(program) {
            self.current = None;
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current = Some(program);
    }

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue) {
        let Some(id) = self.current else { return };
        let Some(Some(program)) = self.programs.get_mut(id.0 as usize) else {
            return;
        };
        let i = slot.0 as usize;
        // GL ignores writes of the wrong type (INVALID_OPERATION)
        if program.uniforms.get(i).is_some_and(|u| value.fits(u.kind)) {
            program.values[i] = Some(value);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if let Some(slot) = self.units.get_mut(unit as usize) {
            *slot = Some(texture);
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    fn draw_quad(&mut self, target: RenderTarget) -> EngineResult<()> {
        let program = self.current_program()?;
        if let RenderTarget::Field(id) = target {
            let sampled = program
                .sampled_units()
                .any(|unit| self.units.get(unit as usize).copied().flatten() == Some(id));
            if sampled {
                return Err(EngineError::FeedbackLoop { texture: id });
            }
        }

        let (target_res, format, mut dst) = match target {
            RenderTarget::Screen => (
                self.surface,
                SURFACE_FORMAT,
                std::mem::take(&mut self.surface_texels),
            ),
            RenderTarget::Field(id) => {
                let tex = self.texture_mut(id)?;
                (tex.resolution, tex.format, std::mem::take(&mut tex.texels))
            }
        };

        let result = self.shade(&mut dst, target_res, format);

        match target {
            RenderTarget::Screen => self.surface_texels = dst,
            RenderTarget::Field(id) => self.texture_mut(id)?.texels = dst,
        }
        self.draw_calls += 1;
        result
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface.width, self.surface.height)
    }

    fn read_texture(&self, texture: TextureId) -> EngineResult<Vec<Texel>> {
        Ok(self.texture(texture)?.texels.clone())
    }

    fn read_surface(&self) -> EngineResult<Vec<Texel>> {
        Ok(self.surface_texels.clone())
    }
}

impl SoftwareBackend {
    /// Run the bound program over `dst`, which has been taken out of its slot
    fn shade(&self, dst: &mut [Texel], target: Resolution, format: FieldFormat) -> EngineResult<()> {
        let program = self.current_program()?;
        let (vw, vh) = self.viewport;
        if vw == 0 || vh == 0 {
            return Ok(());
        }

        let units: Vec<Option<SamplerView<'_>>> = self
            .units
            .iter()
            .map(|bound| {
                bound
                    .and_then(|id| self.texture(id).ok())
                    .map(|t| SamplerView::new(&t.texels, t.resolution, t.filter))
            })
            .collect();
        let bindings = Bindings::new(program, &units);
        let texel_size = bindings.vec2("texelSize");
        let kernel = kernels::prepare(program.kernel, &bindings);

        let draw_width = vw.min(target.width) as usize;
        let draw_height = vh.min(target.height) as usize;
        let row_len = target.width as usize;
        let blend = self.blend;
        let viewport = (vw, vh);

        #[cfg(feature = "parallel")]
        dst.par_chunks_mut(row_len)
            .take(draw_height)
            .enumerate()
            .for_each(|(y, row)| {
                shade_row(y, row, draw_width, viewport, texel_size, &kernel, blend, format)
            });

        #[cfg(not(feature = "parallel"))]
        dst.chunks_mut(row_len)
            .take(draw_height)
            .enumerate()
            .for_each(|(y, row)| {
                shade_row(y, row, draw_width, viewport, texel_size, &kernel, blend, format)
            });

        log::trace!("{}: shaded {}x{}", program.label, draw_width, draw_height);
        Ok(())
    }
}
