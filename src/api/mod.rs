//! JS-facing API (wasm32 only)

pub mod wasm;
