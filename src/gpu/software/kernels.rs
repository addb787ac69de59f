//! Native evaluation of the stage kernels
//!
//! `prepare` reads every uniform once per draw and returns a closure that
//! shades one fragment. The closures mirror the GLSL in `gpu::shaders`
//! operation for operation so both devices agree numerically.

use crate::core::math::{length3, mix, Texel, Vec2};
use crate::gpu::{Kernel, UniformValue};

use super::sampler::{sample, SamplerView};
use super::SoftProgram;

/// Interpolated vertex outputs for one fragment
#[derive(Clone, Copy, Debug)]
pub(super) struct Varyings {
    pub uv: Vec2,
    pub l: Vec2,
    pub r: Vec2,
    pub t: Vec2,
    pub b: Vec2,
}

impl Varyings {
    #[inline]
    pub(super) fn new(uv: Vec2, texel_size: Vec2) -> Self {
        Self {
            uv,
            l: uv - Vec2::new(texel_size.x, 0.0),
            r: uv + Vec2::new(texel_size.x, 0.0),
            t: uv + Vec2::new(0.0, texel_size.y),
            b: uv - Vec2::new(0.0, texel_size.y),
        }
    }
}

pub(super) type KernelFn<'a> = Box<dyn Fn(&Varyings) -> Texel + Sync + 'a>;

/// Uniform values and unit bindings visible to one draw.
/// Unset uniforms read as zero, like freshly linked GL programs.
pub(super) struct Bindings<'p, 'a> {
    program: &'p SoftProgram,
    units: &'p [Option<SamplerView<'a>>],
}

impl<'p, 'a> Bindings<'p, 'a> {
    pub(super) fn new(program: &'p SoftProgram, units: &'p [Option<SamplerView<'a>>]) -> Self {
        Self { program, units }
    }

    fn value(&self, name: &str) -> Option<UniformValue> {
        self.program.value(name)
    }

    pub(super) fn float(&self, name: &str) -> f32 {
        match self.value(name) {
            Some(UniformValue::Float(v)) => v,
            _ => 0.0,
        }
    }

    pub(super) fn vec2(&self, name: &str) -> Vec2 {
        match self.value(name) {
            Some(UniformValue::Vec2(v)) => Vec2::from_array(v),
            _ => Vec2::zero(),
        }
    }

    pub(super) fn vec3(&self, name: &str) -> [f32; 3] {
        match self.value(name) {
            Some(UniformValue::Vec3(v)) => v,
            _ => [0.0; 3],
        }
    }

    pub(super) fn vec4(&self, name: &str) -> [f32; 4] {
        match self.value(name) {
            Some(UniformValue::Vec4(v)) => v,
            _ => [0.0; 4],
        }
    }

    /// Sampler uniforms default to unit 0
    pub(super) fn sampler(&self, name: &str) -> Option<SamplerView<'a>> {
        if !self.program.declares(name) {
            return None;
        }
        let unit = match self.value(name) {
            Some(UniformValue::Int(u)) if u >= 0 => u as usize,
            _ => 0,
        };
        self.units.get(unit).copied().flatten()
    }
}

pub(super) fn prepare<'a>(kernel: Kernel, u: &Bindings<'_, 'a>) -> KernelFn<'a> {
    match kernel {
        // never reaches a draw: compile rejects it as a fragment
        Kernel::BaseVertex => Box::new(|_| [0.0, 0.0, 0.0, 1.0]),

        Kernel::Curl => {
            let velocity = u.sampler("uVelocity");
            Box::new(move |v| {
                let l = sample(&velocity, v.l)[1];
                let r = sample(&velocity, v.r)[1];
                let t = sample(&velocity, v.t)[0];
                let b = sample(&velocity, v.b)[0];
                let vorticity = r - l - t + b;
                [0.5 * vorticity, 0.0, 0.0, 1.0]
            })
        }

        Kernel::Vorticity => {
            let velocity = u.sampler("uVelocity");
            let curl_field = u.sampler("uCurl");
            let strength = u.float("curl");
            let dt = u.float("dt");
            Box::new(move |v| {
                let l = sample(&curl_field, v.l)[0];
                let r = sample(&curl_field, v.r)[0];
                let t = sample(&curl_field, v.t)[0];
                let b = sample(&curl_field, v.b)[0];
                let c = sample(&curl_field, v.uv)[0];

                let mut force = Vec2::new(t.abs() - b.abs(), r.abs() - l.abs()) * 0.5;
                force = force * (1.0 / (force.length() + 0.0001));
                force = force * (strength * c);
                force.y = -force.y;

                let vel = sample(&velocity, v.uv);
                [vel[0] + force.x * dt, vel[1] + force.y * dt, 0.0, 1.0]
            })
        }

        Kernel::Divergence => {
            let velocity = u.sampler("uVelocity");
            Box::new(move |v| {
                let mut l = sample(&velocity, v.l)[0];
                let mut r = sample(&velocity, v.r)[0];
                let mut t = sample(&velocity, v.t)[1];
                let mut b = sample(&velocity, v.b)[1];

                let c = sample(&velocity, v.uv);
                if v.l.x < 0.0 {
                    l = -c[0];
                }
                if v.r.x > 1.0 {
                    r = -c[0];
                }
                if v.t.y > 1.0 {
                    t = -c[1];
                }
                if v.b.y < 0.0 {
                    b = -c[1];
                }

                // half the central difference, see the GLSL source
                [0.25 * (r - l + t - b), 0.0, 0.0, 1.0]
            })
        }

        Kernel::Clear => {
            let texture = u.sampler("uTexture");
            let value = u.float("value");
            Box::new(move |v| {
                let s = sample(&texture, v.uv);
                [value * s[0], value * s[1], value * s[2], value * s[3]]
            })
        }

        Kernel::Pressure => {
            let pressure = u.sampler("uPressure");
            let divergence = u.sampler("uDivergence");
            Box::new(move |v| {
                let l = sample(&pressure, v.l)[0];
                let r = sample(&pressure, v.r)[0];
                let t = sample(&pressure, v.t)[0];
                let b = sample(&pressure, v.b)[0];
                let div = sample(&divergence, v.uv)[0];
                [(l + r + b + t - div) * 0.25, 0.0, 0.0, 1.0]
            })
        }

        Kernel::GradientSubtract => {
            let pressure = u.sampler("uPressure");
            let velocity = u.sampler("uVelocity");
            Box::new(move |v| {
                let l = sample(&pressure, v.l)[0];
                let r = sample(&pressure, v.r)[0];
                let t = sample(&pressure, v.t)[0];
                let b = sample(&pressure, v.b)[0];
                let vel = sample(&velocity, v.uv);
                [vel[0] - (r - l), vel[1] - (t - b), 0.0, 1.0]
            })
        }

        Kernel::Advection => {
            let velocity = u.sampler("uVelocity");
            let source = u.sampler("uSource");
            let texel_size = u.vec2("texelSize");
            let dt = u.float("dt");
            let dissipation = u.float("dissipation");
            Box::new(move |v| {
                let vel = sample(&velocity, v.uv);
                let coord = v.uv - Vec2::new(vel[0], vel[1]) * dt * texel_size;
                let s = sample(&source, coord);
                [dissipation * s[0], dissipation * s[1], dissipation * s[2], 1.0]
            })
        }

        Kernel::AdvectionManualFiltering => {
            let velocity = u.sampler("uVelocity");
            let source = u.sampler("uSource");
            let texel_size = u.vec2("texelSize");
            let dye_texel_size = u.vec2("dyeTexelSize");
            let dt = u.float("dt");
            let dissipation = u.float("dissipation");
            Box::new(move |v| {
                let vel = bilerp(&velocity, v.uv, texel_size);
                let coord = v.uv - Vec2::new(vel[0], vel[1]) * dt * texel_size;
                let s = bilerp(&source, coord, dye_texel_size);
                [dissipation * s[0], dissipation * s[1], dissipation * s[2], 1.0]
            })
        }

        Kernel::Splat => {
            let target = u.sampler("uTarget");
            let aspect = u.float("aspectRatio");
            let color = u.vec3("color");
            let point = u.vec2("point");
            let radius = u.float("radius");
            let r2 = radius * radius;
            Box::new(move |v| {
                let mut p = v.uv - point;
                p.x *= aspect;
                let falloff = (-p.dot(p) / r2).exp();
                let base = sample(&target, v.uv);
                [
                    base[0] + falloff * color[0],
                    base[1] + falloff * color[1],
                    base[2] + falloff * color[2],
                    1.0,
                ]
            })
        }

        Kernel::Color => {
            let color = u.vec4("color");
            Box::new(move |_| color)
        }

        Kernel::Background => {
            let aspect = u.float("aspectRatio");
            Box::new(move |v| {
                let mut p = v.uv - Vec2::new(0.5, 0.5);
                p.x *= aspect;
                let t = (p.length() * 1.2).clamp(0.0, 1.0);
                let shade = 0.92 + (0.78 - 0.92) * t;
                [shade, shade, shade, 1.0]
            })
        }

        Kernel::Display => {
            let texture = u.sampler("uTexture");
            let texel_size = u.vec2("texelSize");
            Box::new(move |v| {
                let rgb = |uv: Vec2| {
                    let s = sample(&texture, uv);
                    [s[0], s[1], s[2]]
                };
                let (l, r, t, b, c) = (rgb(v.l), rgb(v.r), rgb(v.t), rgb(v.b), rgb(v.uv));

                let dx = length3(r) - length3(l);
                let dy = length3(t) - length3(b);

                let n = [dx, dy, texel_size.length()];
                let len = length3(n);
                let nz = if len > 0.0 { n[2] / len } else { 0.0 };

                let diffuse = (nz + 0.7).clamp(0.7, 1.0);
                let shaded = [c[0] * diffuse, c[1] * diffuse, c[2] * diffuse];
                let a = shaded[0].max(shaded[1].max(shaded[2]));
                [shaded[0], shaded[1], shaded[2], a]
            })
        }
    }
}

/// Four nearest taps at texel centers, blended in GL `mix` order
#[inline]
fn bilerp(view: &Option<SamplerView<'_>>, uv: Vec2, tsize: Vec2) -> Texel {
    let st = uv / tsize - Vec2::new(0.5, 0.5);
    let iuv = st.floor();
    let fuv = st.fract();

    let a = sample(view, (iuv + Vec2::new(0.5, 0.5)) * tsize);
    let b = sample(view, (iuv + Vec2::new(1.5, 0.5)) * tsize);
    let c = sample(view, (iuv + Vec2::new(0.5, 1.5)) * tsize);
    let d = sample(view, (iuv + Vec2::new(1.5, 1.5)) * tsize);

    mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y)
}
