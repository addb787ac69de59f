//! Texture-backed grid fields
//!
//! A [`GridField`] owns exactly one backend texture. Fields do not free
//! themselves on drop: the owner calls `release` so that GPU memory is handed
//! back at a known point (stop, or right before a resize reallocates).

mod double;

pub use double::DoubleBuffer;

use crate::core::error::{EngineError, EngineResult};
use crate::gpu::{GpuBackend, RenderTarget, TextureDesc, TextureId};

/// Grid dimensions in cells
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Reciprocal of the grid size, the UV distance between neighbor texels.
    #[inline]
    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    #[inline]
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Width over height; 1 for an empty surface
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Grid tier for a surface: the longer surface edge gets `resolution`
    /// cells, the shorter edge keeps the surface aspect (at least one cell).
    pub fn for_surface(resolution: u32, surface_width: u32, surface_height: u32) -> Self {
        let w = surface_width.max(1) as f64;
        let h = surface_height.max(1) as f64;
        let long = resolution;
        let short = if resolution == 0 {
            0
        } else {
            ((resolution as f64) * w.min(h) / w.max(h)).round().max(1.0) as u32
        };

        if w >= h {
            Self::new(long, short)
        } else {
            Self::new(short, long)
        }
    }
}

/// Storage precision of one channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Precision {
    /// 16-bit float, the preferred storage
    Half,
    /// 32-bit float
    Full,
    /// 8-bit unorm, last resort when no float target is renderable
    Byte,
}

const HALF_MAX: f32 = 65504.0;
const HALF_MIN_NORMAL: f32 = 6.103_515_6e-5; // 2^-14
const HALF_SUBNORMAL_STEP: f32 = 5.960_464_5e-8; // 2^-24

impl Precision {
    pub fn bytes_per_channel(self) -> usize {
        match self {
            Precision::Half => 2,
            Precision::Full => 4,
            Precision::Byte => 1,
        }
    }

    /// Round a value the way storing it in this precision would.
    ///
    /// Half rounds to nearest even and saturates at +-65504; Byte clamps to
    /// [0, 1] and keeps 256 levels.
    #[inline]
    pub fn quantize(self, v: f32) -> f32 {
        match self {
            Precision::Full => v,
            Precision::Byte => (v.clamp(0.0, 1.0) * 255.0).round() / 255.0,
            Precision::Half => {
                if !v.is_finite() {
                    return v;
                }
                if v.abs() < HALF_MIN_NORMAL {
                    return (v / HALF_SUBNORMAL_STEP).round() * HALF_SUBNORMAL_STEP;
                }
                let bits = v.to_bits();
                let lsb = (bits >> 13) & 1;
                let rounded = bits.wrapping_add(0xFFF + lsb) & !0x1FFF;
                f32::from_bits(rounded).clamp(-HALF_MAX, HALF_MAX)
            }
        }
    }
}

/// Channel count plus precision
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldFormat {
    pub channels: u8,
    pub precision: Precision,
}

impl FieldFormat {
    pub const fn rgba(precision: Precision) -> Self {
        Self { channels: 4, precision }
    }

    pub const fn rg(precision: Precision) -> Self {
        Self { channels: 2, precision }
    }

    pub const fn r(precision: Precision) -> Self {
        Self { channels: 1, precision }
    }

    pub fn bytes_per_texel(&self) -> usize {
        self.channels as usize * self.precision.bytes_per_channel()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// One 2D texture-backed field
#[derive(Debug)]
pub struct GridField {
    texture: TextureId,
    resolution: Resolution,
    format: FieldFormat,
    filter: FilterMode,
}

impl GridField {
    /// Allocate a field. A zero axis fails before the backend is touched.
    pub fn create(
        backend: &mut impl GpuBackend,
        label: &str,
        resolution: Resolution,
        format: FieldFormat,
        filter: FilterMode,
    ) -> EngineResult<Self> {
        if !resolution.is_valid() {
            return Err(EngineError::InvalidResolution {
                width: resolution.width,
                height: resolution.height,
            });
        }

        let texture = backend.create_texture(&TextureDesc {
            label,
            resolution,
            format,
            filter,
        })?;

        Ok(Self { texture, resolution, format, filter })
    }

    /// Bind for sampling on `unit` and hand the unit back for the sampler uniform.
    #[inline]
    pub fn attach(&self, backend: &mut impl GpuBackend, unit: u32) -> u32 {
        backend.bind_texture(unit, self.texture);
        unit
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    #[inline]
    pub fn target(&self) -> RenderTarget {
        RenderTarget::Field(self.texture)
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[inline]
    pub fn texel_size(&self) -> [f32; 2] {
        self.resolution.texel_size()
    }

    pub fn format(&self) -> FieldFormat {
        self.format
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    /// GPU memory claimed by this field
    pub fn byte_size(&self) -> usize {
        self.resolution.texel_count() * self.format.bytes_per_texel()
    }

    pub fn release(self, backend: &mut impl GpuBackend) {
        backend.destroy_texture(self.texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texel_size_is_reciprocal() {
        let r = Resolution::new(128, 64);
        assert_eq!(r.texel_size(), [1.0 / 128.0, 1.0 / 64.0]);
        assert_eq!(r.texel_count(), 128 * 64);
    }

    #[test]
    fn surface_tier_puts_resolution_on_longer_edge() {
        assert_eq!(Resolution::for_surface(128, 1920, 1080), Resolution::new(128, 72));
        assert_eq!(Resolution::for_surface(128, 1080, 1920), Resolution::new(72, 128));
        assert_eq!(Resolution::for_surface(64, 500, 500), Resolution::new(64, 64));
        assert_eq!(Resolution::for_surface(4, 10000, 10), Resolution::new(4, 1));
    }

    #[test]
    fn aspect_of_empty_surface_is_square() {
        assert_eq!(Resolution::new(128, 64).aspect(), 2.0);
        assert_eq!(Resolution::new(128, 0).aspect(), 1.0);
    }

    #[test]
    fn zero_resolution_tier_is_invalid() {
        assert!(!Resolution::for_surface(0, 800, 600).is_valid());
    }

    #[test]
    fn half_quantize_matches_f16_grid() {
        let h = Precision::Half;
        assert_eq!(h.quantize(1.0), 1.0);
        assert_eq!(h.quantize(0.5), 0.5);
        // 1 + 2^-11 is a tie between 1 and 1 + 2^-10; ties go to even.
        assert_eq!(h.quantize(1.0 + 1.0 / 2048.0), 1.0);
        assert_eq!(h.quantize(1.0 + 3.0 / 2048.0), 1.0 + 2.0 / 1024.0);
        assert_eq!(h.quantize(-2.0), -2.0);
        assert_eq!(h.quantize(1.0e6), 65504.0);
        assert_eq!(h.quantize(-1.0e6), -65504.0);
    }

    #[test]
    fn byte_quantize_clamps() {
        let b = Precision::Byte;
        assert_eq!(b.quantize(-3.0), 0.0);
        assert_eq!(b.quantize(7.0), 1.0);
        assert!((b.quantize(0.5) - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn format_byte_sizes() {
        assert_eq!(FieldFormat::rgba(Precision::Half).bytes_per_texel(), 8);
        assert_eq!(FieldFormat::rg(Precision::Full).bytes_per_texel(), 8);
        assert_eq!(FieldFormat::r(Precision::Byte).bytes_per_texel(), 1);
    }
}
