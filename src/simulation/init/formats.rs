use crate::core::field::{FilterMode, Precision};
use crate::gpu::Capabilities;

/// Storage decisions made once per device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldFormats {
    pub precision: Precision,
    /// Filter for velocity and dye; curl, divergence, pressure are always nearest
    pub filter: FilterMode,
    /// Advection blends four nearest taps itself
    pub manual_filtering: bool,
}

/// Pick the field precision and filtering. Gaps fall back, never fail:
/// half float, then full float, then 8-bit; no linear filtering for the
/// chosen precision switches advection to manual bilinear taps.
pub(super) fn negotiate(caps: Capabilities) -> FieldFormats {
    let precision = if caps.half_float.renderable {
        Precision::Half
    } else if caps.full_float.renderable {
        log::warn!("half-float render targets unavailable, using 32-bit float fields");
        Precision::Full
    } else {
        log::warn!("no float render targets, falling back to 8-bit fields (velocity will saturate)");
        Precision::Byte
    };

    let linear = caps.support(precision).linear;
    if !linear {
        log::warn!(
            "{:?} fields cannot be linearly filtered, advection switches to manual bilinear filtering",
            precision
        );
    }

    FieldFormats {
        precision,
        filter: if linear { FilterMode::Linear } else { FilterMode::Nearest },
        manual_filtering: !linear,
    }
}
