//! GLSL ES sources for every stage program
//!
//! All fragment kernels share [`BASE_VERTEX`], which emits the full-screen
//! quad plus the four axis-neighbor UVs (`vL`, `vR`, `vT`, `vB`) derived from
//! `texelSize`. The software device evaluates the same kernels on the CPU; the
//! [`Kernel`] tag tells it which one a source describes.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kernel {
    BaseVertex,
    Curl,
    Vorticity,
    Divergence,
    Clear,
    Pressure,
    GradientSubtract,
    Advection,
    AdvectionManualFiltering,
    Splat,
    Color,
    Background,
    Display,
}

#[derive(Clone, Copy, Debug)]
pub struct ShaderSource {
    pub label: &'static str,
    pub stage: ShaderStage,
    pub kernel: Kernel,
    pub glsl: &'static str,
}

pub const BASE_VERTEX: ShaderSource = ShaderSource {
    label: "base.vert",
    stage: ShaderStage::Vertex,
    kernel: Kernel::BaseVertex,
    glsl: r#"
precision highp float;

attribute vec2 aPosition;
varying vec2 vUv;
varying vec2 vL;
varying vec2 vR;
varying vec2 vT;
varying vec2 vB;
uniform vec2 texelSize;

void main () {
    vUv = aPosition * 0.5 + 0.5;
    vL = vUv - vec2(texelSize.x, 0.0);
    vR = vUv + vec2(texelSize.x, 0.0);
    vT = vUv + vec2(0.0, texelSize.y);
    vB = vUv - vec2(0.0, texelSize.y);
    gl_Position = vec4(aPosition, 0.0, 1.0);
}
"#,
};

pub const CURL: ShaderSource = ShaderSource {
    label: "curl.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::Curl,
    glsl: r#"
precision mediump float;
precision mediump sampler2D;

varying highp vec2 vUv;
varying highp vec2 vL;
varying highp vec2 vR;
varying highp vec2 vT;
varying highp vec2 vB;
uniform sampler2D uVelocity;

void main () {
    float L = texture2D(uVelocity, vL).y;
    float R = texture2D(uVelocity, vR).y;
    float T = texture2D(uVelocity, vT).x;
    float B = texture2D(uVelocity, vB).x;
    float vorticity = R - L - T + B;
    gl_FragColor = vec4(0.5 * vorticity, 0.0, 0.0, 1.0);
}
"#,
};

pub const VORTICITY: ShaderSource = ShaderSource {
    label: "vorticity.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::Vorticity,
    glsl: r#"
precision highp float;
precision highp sampler2D;

varying vec2 vUv;
varying vec2 vL;
varying vec2 vR;
varying vec2 vT;
varying vec2 vB;
uniform sampler2D uVelocity;
uniform sampler2D uCurl;
uniform float curl;
uniform float dt;

void main () {
    float L = texture2D(uCurl, vL).x;
    float R = texture2D(uCurl, vR).x;
    float T = texture2D(uCurl, vT).x;
    float B = texture2D(uCurl, vB).x;
    float C = texture2D(uCurl, vUv).x;

    vec2 force = 0.5 * vec2(abs(T) - abs(B), abs(R) - abs(L));
    force /= length(force) + 0.0001;
    force *= curl * C;
    force.y *= -1.0;

    vec2 velocity = texture2D(uVelocity, vUv).xy;
    velocity += force * dt;
    gl_FragColor = vec4(velocity, 0.0, 1.0);
}
"#,
};

pub const DIVERGENCE: ShaderSource = ShaderSource {
    label: "divergence.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::Divergence,
    glsl: r#"
precision mediump float;
precision mediump sampler2D;

varying highp vec2 vUv;
varying highp vec2 vL;
varying highp vec2 vR;
varying highp vec2 vT;
varying highp vec2 vB;
uniform sampler2D uVelocity;

void main () {
    float L = texture2D(uVelocity, vL).x;
    float R = texture2D(uVelocity, vR).x;
    float T = texture2D(uVelocity, vT).y;
    float B = texture2D(uVelocity, vB).y;

    vec2 C = texture2D(uVelocity, vUv).xy;
    if (vL.x < 0.0) { L = -C.x; }
    if (vR.x > 1.0) { R = -C.x; }
    if (vT.y > 1.0) { T = -C.y; }
    if (vB.y < 0.0) { B = -C.y; }

    // 0.25, not 0.5: pairs with the full-width (R - L, T - B) pressure
    // gradient so more Jacobi iterations always lower the residual
    float div = 0.25 * (R - L + T - B);
    gl_FragColor = vec4(div, 0.0, 0.0, 1.0);
}
"#,
};

pub const CLEAR: ShaderSource = ShaderSource {
    label: "clear.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::Clear,
    glsl: r#"
precision mediump float;
precision mediump sampler2D;

varying highp vec2 vUv;
uniform sampler2D uTexture;
uniform float value;

void main () {
    gl_FragColor = value * texture2D(uTexture, vUv);
}
"#,
};

pub const PRESSURE: ShaderSource = ShaderSource {
    label: "pressure.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::Pressure,
    glsl: r#"
precision mediump float;
precision mediump sampler2D;

varying highp vec2 vUv;
varying highp vec2 vL;
varying highp vec2 vR;
varying highp vec2 vT;
varying highp vec2 vB;
uniform sampler2D uPressure;
uniform sampler2D uDivergence;

void main () {
    float L = texture2D(uPressure, vL).x;
    float R = texture2D(uPressure, vR).x;
    float T = texture2D(uPressure, vT).x;
    float B = texture2D(uPressure, vB).x;
    float divergence = texture2D(uDivergence, vUv).x;
    float pressure = (L + R + B + T - divergence) * 0.25;
    gl_FragColor = vec4(pressure, 0.0, 0.0, 1.0);
}
"#,
};

pub const GRADIENT_SUBTRACT: ShaderSource = ShaderSource {
    label: "gradient_subtract.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::GradientSubtract,
    glsl: r#"
precision mediump float;
precision mediump sampler2D;

varying highp vec2 vUv;
varying highp vec2 vL;
varying highp vec2 vR;
varying highp vec2 vT;
varying highp vec2 vB;
uniform sampler2D uPressure;
uniform sampler2D uVelocity;

void main () {
    float L = texture2D(uPressure, vL).x;
    float R = texture2D(uPressure, vR).x;
    float T = texture2D(uPressure, vT).x;
    float B = texture2D(uPressure, vB).x;
    vec2 velocity = texture2D(uVelocity, vUv).xy;
    velocity.xy -= vec2(R - L, T - B);
    gl_FragColor = vec4(velocity, 0.0, 1.0);
}
"#,
};

pub const ADVECTION: ShaderSource = ShaderSource {
    label: "advection.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::Advection,
    glsl: r#"
precision highp float;
precision highp sampler2D;

varying vec2 vUv;
uniform sampler2D uVelocity;
uniform sampler2D uSource;
uniform vec2 texelSize;
uniform float dt;
uniform float dissipation;

void main () {
    vec2 coord = vUv - dt * texture2D(uVelocity, vUv).xy * texelSize;
    gl_FragColor = dissipation * texture2D(uSource, coord);
    gl_FragColor.a = 1.0;
}
"#,
};

/// Advection for devices without linear filtering of the field precision:
/// four nearest taps blended by hand.
pub const ADVECTION_MANUAL_FILTERING: ShaderSource = ShaderSource {
    label: "advection_manual_filtering.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::AdvectionManualFiltering,
    glsl: r#"
precision highp float;
precision highp sampler2D;

varying vec2 vUv;
uniform sampler2D uVelocity;
uniform sampler2D uSource;
uniform vec2 texelSize;
uniform vec2 dyeTexelSize;
uniform float dt;
uniform float dissipation;

vec4 bilerp (sampler2D sam, vec2 uv, vec2 tsize) {
    vec2 st = uv / tsize - 0.5;

    vec2 iuv = floor(st);
    vec2 fuv = fract(st);

    vec4 a = texture2D(sam, (iuv + vec2(0.5, 0.5)) * tsize);
    vec4 b = texture2D(sam, (iuv + vec2(1.5, 0.5)) * tsize);
    vec4 c = texture2D(sam, (iuv + vec2(0.5, 1.5)) * tsize);
    vec4 d = texture2D(sam, (iuv + vec2(1.5, 1.5)) * tsize);

    return mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y);
}

void main () {
    vec2 coord = vUv - dt * bilerp(uVelocity, vUv, texelSize).xy * texelSize;
    gl_FragColor = dissipation * bilerp(uSource, coord, dyeTexelSize);
    gl_FragColor.a = 1.0;
}
"#,
};

pub const SPLAT: ShaderSource = ShaderSource {
    label: "splat.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::Splat,
    glsl: r#"
precision highp float;
precision highp sampler2D;

varying vec2 vUv;
uniform sampler2D uTarget;
uniform float aspectRatio;
uniform vec3 color;
uniform vec2 point;
uniform float radius;

void main () {
    vec2 p = vUv - point.xy;
    p.x *= aspectRatio;
    vec3 splat = exp(-dot(p, p) / (radius * radius)) * color;
    vec3 base = texture2D(uTarget, vUv).xyz;
    gl_FragColor = vec4(base + splat, 1.0);
}
"#,
};

pub const COLOR: ShaderSource = ShaderSource {
    label: "color.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::Color,
    glsl: r#"
precision mediump float;

uniform vec4 color;

void main () {
    gl_FragColor = color;
}
"#,
};

pub const BACKGROUND: ShaderSource = ShaderSource {
    label: "background.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::Background,
    glsl: r#"
precision highp float;

varying vec2 vUv;
uniform float aspectRatio;

void main () {
    vec2 p = vUv - 0.5;
    p.x *= aspectRatio;
    float shade = mix(0.92, 0.78, clamp(length(p) * 1.2, 0.0, 1.0));
    gl_FragColor = vec4(vec3(shade), 1.0);
}
"#,
};

pub const DISPLAY: ShaderSource = ShaderSource {
    label: "display.frag",
    stage: ShaderStage::Fragment,
    kernel: Kernel::Display,
    glsl: r#"
precision highp float;
precision highp sampler2D;

varying vec2 vUv;
varying vec2 vL;
varying vec2 vR;
varying vec2 vT;
varying vec2 vB;
uniform sampler2D uTexture;
uniform vec2 texelSize;

void main () {
    vec3 L = texture2D(uTexture, vL).rgb;
    vec3 R = texture2D(uTexture, vR).rgb;
    vec3 T = texture2D(uTexture, vT).rgb;
    vec3 B = texture2D(uTexture, vB).rgb;
    vec3 C = texture2D(uTexture, vUv).rgb;

    float dx = length(R) - length(L);
    float dy = length(T) - length(B);

    vec3 n = normalize(vec3(dx, dy, length(texelSize)));
    vec3 l = vec3(0.0, 0.0, 1.0);

    float diffuse = clamp(dot(n, l) + 0.7, 0.7, 1.0);
    C.rgb *= diffuse;

    float a = max(C.r, max(C.g, C.b));
    gl_FragColor = vec4(C, a);
}
"#,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_sources_have_entry_points() {
        for src in [
            CURL,
            VORTICITY,
            DIVERGENCE,
            CLEAR,
            PRESSURE,
            GRADIENT_SUBTRACT,
            ADVECTION,
            ADVECTION_MANUAL_FILTERING,
            SPLAT,
            COLOR,
            BACKGROUND,
            DISPLAY,
        ] {
            assert_eq!(src.stage, ShaderStage::Fragment, "{}", src.label);
            assert!(src.glsl.contains("void main"), "{}", src.label);
        }
        assert_eq!(BASE_VERTEX.stage, ShaderStage::Vertex);
    }
}
