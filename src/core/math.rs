//! Small math types shared by the software kernels.

/// RGBA texel as stored by the software device.
pub type Texel = [f32; 4];

/// 2D vector in normalized texture space
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn from_array(v: [f32; 2]) -> Self {
        Self { x: v[0], y: v[1] }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(&self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn floor(&self) -> Self {
        Self { x: self.x.floor(), y: self.y.floor() }
    }

    /// GLSL `fract`: `v - floor(v)`, always in [0, 1).
    pub fn fract(&self) -> Self {
        Self { x: self.x - self.x.floor(), y: self.y - self.y.floor() }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self { x: self.x * rhs, y: self.y * rhs }
    }
}

/// Component-wise product
impl std::ops::Mul for Vec2 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self { x: self.x * rhs.x, y: self.y * rhs.y }
    }
}

/// Component-wise quotient
impl std::ops::Div for Vec2 {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self { x: self.x / rhs.x, y: self.y / rhs.y }
    }
}

/// GLSL `mix` on full texels.
#[inline]
pub fn mix(a: Texel, b: Texel, t: f32) -> Texel {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

#[inline]
pub fn length3(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fract_is_positive_for_negative_input() {
        let v = Vec2::new(-0.25, 1.75).fract();
        assert!((v.x - 0.75).abs() < 1e-6);
        assert!((v.y - 0.75).abs() < 1e-6);
    }

    #[test]
    fn mix_interpolates_every_channel() {
        let m = mix([0.0, 2.0, -1.0, 1.0], [1.0, 4.0, 1.0, 1.0], 0.5);
        assert_eq!(m, [0.5, 3.0, 0.0, 1.0]);
    }
}
