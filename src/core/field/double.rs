use crate::core::error::EngineResult;
use crate::gpu::GpuBackend;

use super::{FieldFormat, FilterMode, GridField, Resolution};

/// Ping-pong pair of fields
///
/// Stages sample `read` and render into `write`, then call [`swap`]. The swap
/// only exchanges the two handles; no texel data moves.
///
/// [`swap`]: DoubleBuffer::swap
#[derive(Debug)]
pub struct DoubleBuffer {
    read: GridField,
    write: GridField,
}

impl DoubleBuffer {
    /// Allocate both sides. If the second allocation fails the first is
    /// released again, so no half-built pair survives.
    pub fn create(
        backend: &mut impl GpuBackend,
        label: &str,
        resolution: Resolution,
        format: FieldFormat,
        filter: FilterMode,
    ) -> EngineResult<Self> {
        let read = GridField::create(backend, &format!("{label}.read"), resolution, format, filter)?;
        let write = match GridField::create(backend, &format!("{label}.write"), resolution, format, filter) {
            Ok(write) => write,
            Err(e) => {
                read.release(backend);
                return Err(e);
            }
        };

        Ok(Self { read, write })
    }

    #[inline]
    pub fn read(&self) -> &GridField {
        &self.read
    }

    #[inline]
    pub fn write(&self) -> &GridField {
        &self.write
    }

    #[inline]
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }

    pub fn resolution(&self) -> Resolution {
        self.read.resolution()
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.read.texel_size()
    }

    pub fn byte_size(&self) -> usize {
        self.read.byte_size() + self.write.byte_size()
    }

    pub fn release(self, backend: &mut impl GpuBackend) {
        self.read.release(backend);
        self.write.release(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::Precision;
    use crate::gpu::software::SoftwareBackend;

    fn pair(backend: &mut SoftwareBackend) -> DoubleBuffer {
        DoubleBuffer::create(
            backend,
            "velocity",
            Resolution::new(8, 4),
            FieldFormat::rg(Precision::Full),
            FilterMode::Linear,
        )
        .unwrap()
    }

    #[test]
    fn swap_exchanges_roles_without_touching_handles() {
        let mut backend = SoftwareBackend::new(16, 16);
        let mut buffer = pair(&mut backend);
        let read = buffer.read().texture();
        let write = buffer.write().texture();

        buffer.swap();
        assert_eq!(buffer.read().texture(), write);
        assert_eq!(buffer.write().texture(), read);

        buffer.swap();
        assert_eq!(buffer.read().texture(), read);
        assert_eq!(buffer.write().texture(), write);
    }

    #[test]
    fn swap_keeps_contents_with_their_texture() {
        let mut backend = SoftwareBackend::new(16, 16);
        let mut buffer = pair(&mut backend);
        let marked = vec![[1.0, 2.0, 0.0, 1.0]; 32];
        backend.upload(buffer.write().texture(), &marked).unwrap();

        buffer.swap();
        let texels = backend.read_texture(buffer.read().texture()).unwrap();
        assert_eq!(texels[0], [1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn zero_axis_fails_before_allocation() {
        let mut backend = SoftwareBackend::new(16, 16);
        let err = DoubleBuffer::create(
            &mut backend,
            "dye",
            Resolution::new(0, 4),
            FieldFormat::rgba(Precision::Half),
            FilterMode::Linear,
        )
        .unwrap_err();
        assert!(matches!(err, crate::core::EngineError::InvalidResolution { width: 0, height: 4 }));
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn failed_second_side_releases_first() {
        let mut backend = SoftwareBackend::new(16, 16);
        // room for exactly one side
        backend.set_memory_budget(Some(8 * 4 * 8));
        let err = DoubleBuffer::create(
            &mut backend,
            "velocity",
            Resolution::new(8, 4),
            FieldFormat::rg(Precision::Full),
            FilterMode::Linear,
        )
        .unwrap_err();
        assert!(matches!(err, crate::core::EngineError::Allocation { .. }));
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.allocated_bytes(), 0);
    }

    #[test]
    fn release_frees_both_sides() {
        let mut backend = SoftwareBackend::new(16, 16);
        let buffer = pair(&mut backend);
        assert_eq!(backend.live_textures(), 2);
        buffer.release(&mut backend);
        assert_eq!(backend.live_textures(), 0);
    }
}
