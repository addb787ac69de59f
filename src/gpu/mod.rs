//! GPU device seam
//!
//! Everything above this module talks to the device through [`GpuBackend`]:
//! textures, programs with named uniform slots, and a full-screen quad draw.
//! Two devices implement it:
//! - [`software::SoftwareBackend`] - CPU reference device (rayon row shading),
//!   used by tests and native builds
//! - `webgl::WebGlBackend` - WebGL2 device, wasm32 only

pub mod shaders;
pub mod software;
#[cfg(target_arch = "wasm32")]
pub mod webgl;

use crate::core::error::EngineResult;
use crate::core::field::{FieldFormat, FilterMode, Precision, Resolution};
use crate::core::math::Texel;

pub use shaders::{Kernel, ShaderSource, ShaderStage};

/// Texture units available to one draw
pub const MAX_TEXTURE_UNITS: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Uniform location inside the currently bound program
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformSlot(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    Sampler2D,
}

impl UniformKind {
    /// Map a GLSL type keyword
    pub fn from_glsl(ty: &str) -> Option<Self> {
        match ty {
            "float" => Some(UniformKind::Float),
            "vec2" => Some(UniformKind::Vec2),
            "vec3" => Some(UniformKind::Vec3),
            "vec4" => Some(UniformKind::Vec4),
            "int" => Some(UniformKind::Int),
            "sampler2D" => Some(UniformKind::Sampler2D),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Integers and sampler texture units
    Int(i32),
}

impl UniformValue {
    /// Whether this value can be written to a slot of `kind`
    pub fn fits(&self, kind: UniformKind) -> bool {
        matches!(
            (self, kind),
            (UniformValue::Float(_), UniformKind::Float)
                | (UniformValue::Vec2(_), UniformKind::Vec2)
                | (UniformValue::Vec3(_), UniformKind::Vec3)
                | (UniformValue::Vec4(_), UniformKind::Vec4)
                | (UniformValue::Int(_), UniformKind::Int)
                | (UniformValue::Int(_), UniformKind::Sampler2D)
        )
    }
}

/// One active uniform reported by the device after linking
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveUniform {
    pub name: String,
    pub kind: UniformKind,
    pub slot: UniformSlot,
}

#[derive(Clone, Debug)]
pub struct CompiledProgram {
    pub id: ProgramId,
    pub uniforms: Vec<ActiveUniform>,
}

pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub resolution: Resolution,
    pub format: FieldFormat,
    pub filter: FilterMode,
}

/// Where a draw lands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderTarget {
    /// The display surface (default framebuffer)
    Screen,
    Field(TextureId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Disabled,
    /// `ONE, ONE_MINUS_SRC_ALPHA`
    PremultipliedOver,
}

/// Render/filter support of one float precision
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatSupport {
    pub renderable: bool,
    pub linear: bool,
}

/// What the device can store and filter. 8-bit targets are always renderable
/// and filterable, so only the float precisions are probed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub half_float: FormatSupport,
    pub full_float: FormatSupport,
}

impl Capabilities {
    /// Everything supported
    pub const fn full() -> Self {
        let all = FormatSupport { renderable: true, linear: true };
        Self { half_float: all, full_float: all }
    }

    /// No float render targets at all
    pub const fn minimal() -> Self {
        let none = FormatSupport { renderable: false, linear: false };
        Self { half_float: none, full_float: none }
    }

    pub fn support(&self, precision: Precision) -> FormatSupport {
        match precision {
            Precision::Half => self.half_float,
            Precision::Full => self.full_float,
            Precision::Byte => FormatSupport { renderable: true, linear: true },
        }
    }
}

/// Device operations the solver needs
///
/// Uniforms and draws follow GL state-machine semantics: `set_uniform`
/// writes into the program made current by `use_program`, `bind_texture`
/// binds per unit, and `draw_quad` rasterizes the full-screen quad into the
/// current viewport of `target`.
pub trait GpuBackend {
    fn capabilities(&self) -> Capabilities;

    fn create_texture(&mut self, desc: &TextureDesc) -> EngineResult<TextureId>;

    /// Unknown ids are ignored
    fn destroy_texture(&mut self, texture: TextureId);

    fn compile_program(
        &mut self,
        label: &str,
        vertex: &ShaderSource,
        fragment: &ShaderSource,
    ) -> EngineResult<CompiledProgram>;

    fn destroy_program(&mut self, program: ProgramId);

    fn use_program(&mut self, program: ProgramId);

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn set_viewport(&mut self, width: u32, height: u32);

    fn set_blend(&mut self, mode: BlendMode);

    fn draw_quad(&mut self, target: RenderTarget) -> EngineResult<()>;

    /// Drawing-buffer size of the display surface
    fn surface_size(&self) -> (u32, u32);

    /// Copy a texture back as RGBA texels, row 0 at the bottom
    fn read_texture(&self, texture: TextureId) -> EngineResult<Vec<Texel>>;

    fn read_surface(&self) -> EngineResult<Vec<Texel>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_slots_take_int_units() {
        assert!(UniformValue::Int(3).fits(UniformKind::Sampler2D));
        assert!(!UniformValue::Float(3.0).fits(UniformKind::Sampler2D));
        assert!(!UniformValue::Vec2([0.0; 2]).fits(UniformKind::Vec3));
    }

    #[test]
    fn byte_storage_always_supported() {
        let caps = Capabilities::minimal();
        assert!(caps.support(Precision::Byte).renderable);
        assert!(!caps.support(Precision::Half).renderable);
    }
}
