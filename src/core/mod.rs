//! Core building blocks shared by every layer: errors, grid fields, texel
//! access and small math.

// Utils with texel macros (must be first for macro export!)
#[macro_use]
#[path = "utils/texel.rs"]
pub mod texel;

pub mod error;
pub mod field;
pub mod math;

#[cfg(target_arch = "wasm32")]
pub mod console_log;

pub use error::{EngineError, EngineResult};
pub use field::{DoubleBuffer, FieldFormat, FilterMode, GridField, Precision, Resolution};
pub use math::{Texel, Vec2};
