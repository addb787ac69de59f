//! Uniform reflection for the software device
//!
//! The software device does not execute GLSL; it runs the native kernel named
//! by the source's [`Kernel`] tag. Compilation still checks what a driver
//! would reject early (wrong stage, no entry point, unsupported uniform type,
//! conflicting declarations across stages) and reports the declared uniforms
//! the way `getActiveUniform` would.

use crate::core::error::{EngineError, EngineResult};
use crate::gpu::{Kernel, ShaderSource, ShaderStage, UniformKind};

const PRECISION_QUALIFIERS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Declared uniforms of one stage, in source order
pub(super) fn reflect(source: &ShaderSource, expected: ShaderStage) -> EngineResult<Vec<(String, UniformKind)>> {
    let compile_error = |log: String| EngineError::ShaderCompile {
        label: source.label.to_string(),
        log,
    };

    if source.stage != expected {
        return Err(compile_error(format!(
            "expected a {:?} shader, got {:?}",
            expected, source.stage
        )));
    }
    let is_vertex_kernel = source.kernel == Kernel::BaseVertex;
    if is_vertex_kernel != (expected == ShaderStage::Vertex) {
        return Err(compile_error(format!(
            "kernel {:?} cannot run as a {:?} shader",
            source.kernel, expected
        )));
    }
    if !source.glsl.contains("void main") {
        return Err(compile_error("no entry point 'main'".to_string()));
    }

    let mut uniforms = Vec::new();
    for (line_no, line) in source.glsl.lines().enumerate() {
        let Some(decl) = line.trim().strip_prefix("uniform ") else {
            continue;
        };
        let mut tokens = decl
            .split_whitespace()
            .filter(|t| !PRECISION_QUALIFIERS.contains(t));
        let (Some(ty), Some(name)) = (tokens.next(), tokens.next()) else {
            return Err(compile_error(format!("{}: malformed uniform declaration", line_no + 1)));
        };
        let name = name.trim_end_matches(';');
        let kind = UniformKind::from_glsl(ty)
            .ok_or_else(|| compile_error(format!("{}: unsupported uniform type '{}'", line_no + 1, ty)))?;
        uniforms.push((name.to_string(), kind));
    }

    Ok(uniforms)
}

/// Merge vertex and fragment uniforms; a name declared with two types fails to link.
pub(super) fn link(
    label: &str,
    vertex: Vec<(String, UniformKind)>,
    fragment: Vec<(String, UniformKind)>,
) -> EngineResult<Vec<(String, UniformKind)>> {
    let mut merged = vertex;
    for (name, kind) in fragment {
        match merged.iter().find(|(n, _)| *n == name) {
            Some((_, existing)) if *existing != kind => {
                return Err(EngineError::ShaderLink {
                    label: label.to_string(),
                    log: format!(
                        "uniform '{}' declared as {:?} and {:?}",
                        name, existing, kind
                    ),
                });
            }
            Some(_) => {}
            None => merged.push((name, kind)),
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::shaders;

    #[test]
    fn reflects_declared_uniforms() {
        let uniforms = reflect(&shaders::VORTICITY, ShaderStage::Fragment).unwrap();
        let names: Vec<&str> = uniforms.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["uVelocity", "uCurl", "curl", "dt"]);
        assert_eq!(uniforms[2].1, UniformKind::Float);
    }

    #[test]
    fn precision_qualifier_is_skipped() {
        let src = ShaderSource {
            label: "q.frag",
            stage: ShaderStage::Fragment,
            kernel: Kernel::Clear,
            glsl: "uniform highp vec2 point;\nvoid main () {}",
        };
        assert_eq!(
            reflect(&src, ShaderStage::Fragment).unwrap(),
            vec![("point".to_string(), UniformKind::Vec2)]
        );
    }

    #[test]
    fn unsupported_type_fails_to_compile() {
        let src = ShaderSource {
            label: "bad.frag",
            stage: ShaderStage::Fragment,
            kernel: Kernel::Clear,
            glsl: "uniform mat3 m;\nvoid main () {}",
        };
        let err = reflect(&src, ShaderStage::Fragment).unwrap_err();
        match err {
            EngineError::ShaderCompile { label, log } => {
                assert_eq!(label, "bad.frag");
                assert!(log.contains("mat3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn vertex_kernel_rejected_as_fragment() {
        let err = reflect(&shaders::BASE_VERTEX, ShaderStage::Fragment).unwrap_err();
        assert!(matches!(err, EngineError::ShaderCompile { .. }));
    }

    #[test]
    fn conflicting_types_fail_to_link() {
        let err = link(
            "p",
            vec![("texelSize".to_string(), UniformKind::Vec2)],
            vec![("texelSize".to_string(), UniformKind::Float)],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ShaderLink { .. }));
    }
}
