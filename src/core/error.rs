//! Engine error taxonomy
//!
//! Program build and allocation failures abort simulation startup.
//! Capability gaps never surface here: they are resolved into fallbacks when
//! formats are negotiated. Malformed splats are dropped and counted instead.

use thiserror::Error;

use crate::gpu::TextureId;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("shader '{label}' failed to compile: {log}")]
    ShaderCompile { label: String, log: String },

    #[error("program '{label}' failed to link: {log}")]
    ShaderLink { label: String, log: String },

    #[error("program '{program}' has no uniform named '{name}'")]
    UnknownUniform { program: String, name: String },

    #[error("failed to allocate field '{label}': {reason}")]
    Allocation { label: String, reason: String },

    #[error("invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("texture {texture:?} is both sampled and rendered to")]
    FeedbackLoop { texture: TextureId },

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("simulation resources were released")]
    Released,

    #[error("not supported by this device: {0}")]
    Unsupported(&'static str),

    #[error("rendering context error: {0}")]
    Context(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
