use serde::{Deserialize, Serialize};

/// Linear RGB triple. Dye colors use [0, 1] (bursts go above 1), the
/// background color uses 0-255.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn scaled(self, k: f32) -> Self {
        Self::new(self.r * k, self.g * k, self.b * k)
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Dim saturated dye: a random hue at full saturation and value, scaled by 0.15.
/// `rand` yields uniform values in [0, 1).
pub fn generate_color(rand: &mut impl FnMut() -> f32) -> Rgb {
    hsv_to_rgb(rand(), 1.0, 1.0).scaled(0.15)
}

/// `h`, `s`, `v` in [0, 1]
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (i as i32).rem_euclid(6) {
        0 => Rgb::new(v, t, p),
        1 => Rgb::new(q, v, p),
        2 => Rgb::new(p, v, t),
        3 => Rgb::new(p, q, v),
        4 => Rgb::new(t, p, v),
        _ => Rgb::new(v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_hues() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb::new(1.0, 0.0, 0.0));
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!((green.g - 1.0).abs() < 1e-6 && green.r.abs() < 1e-5);
        let blue = hsv_to_rgb(2.0 / 3.0, 1.0, 1.0);
        assert!((blue.b - 1.0).abs() < 1e-6 && blue.g.abs() < 1e-5);
    }

    #[test]
    fn generated_colors_are_dim_and_saturated() {
        let mut seq = [0.1f32, 0.5, 0.95].into_iter();
        let mut rand = || seq.next().unwrap_or(0.0);
        for _ in 0..3 {
            let c = generate_color(&mut rand);
            let max = c.r.max(c.g).max(c.b);
            let min = c.r.min(c.g).min(c.b);
            assert!((max - 0.15).abs() < 1e-6);
            assert!(min.abs() < 1e-6);
        }
    }
}
