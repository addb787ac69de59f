use crate::core::field::{FilterMode, Resolution};
use crate::core::math::{mix, Texel, Vec2};

/// What `texture2D` returns for a unit with nothing bound
pub(super) const UNBOUND_TEXEL: Texel = [0.0, 0.0, 0.0, 1.0];

/// Read-only view of one texture for a draw, clamp-to-edge addressing
#[derive(Clone, Copy)]
pub(super) struct SamplerView<'a> {
    texels: &'a [Texel],
    width: i32,
    height: i32,
    filter: FilterMode,
}

impl<'a> SamplerView<'a> {
    pub(super) fn new(texels: &'a [Texel], resolution: Resolution, filter: FilterMode) -> Self {
        Self {
            texels,
            width: resolution.width as i32,
            height: resolution.height as i32,
            filter,
        }
    }

    #[inline]
    fn fetch(&self, x: i32, y: i32) -> Texel {
        let x = x.clamp(0, self.width - 1);
        let y = y.clamp(0, self.height - 1);
        texel!(self.texels, [(y * self.width + x) as usize])
    }

    /// GL `texture2D` with the view's filter mode
    #[inline]
    pub(super) fn sample(&self, uv: Vec2) -> Texel {
        let st = Vec2::new(uv.x * self.width as f32, uv.y * self.height as f32);
        match self.filter {
            FilterMode::Nearest => {
                let i = st.floor();
                self.fetch(i.x as i32, i.y as i32)
            }
            FilterMode::Linear => {
                let st = st - Vec2::new(0.5, 0.5);
                let i = st.floor();
                let f = st.fract();
                let (x, y) = (i.x as i32, i.y as i32);
                let (x1, y1) = (x.saturating_add(1), y.saturating_add(1));
                let a = self.fetch(x, y);
                let b = self.fetch(x1, y);
                let c = self.fetch(x, y1);
                let d = self.fetch(x1, y1);
                mix(mix(a, b, f.x), mix(c, d, f.x), f.y)
            }
        }
    }
}

/// Sample through an optional binding
#[inline]
pub(super) fn sample(view: &Option<SamplerView<'_>>, uv: Vec2) -> Texel {
    match view {
        Some(v) => v.sample(uv),
        None => UNBOUND_TEXEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Vec<Texel> {
        // 2x2: values 0, 1 on the bottom row, 2, 3 on the top row
        vec![
            [0.0, 0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 1.0],
            [2.0, 0.0, 0.0, 1.0],
            [3.0, 0.0, 0.0, 1.0],
        ]
    }

    #[test]
    fn nearest_picks_containing_texel() {
        let texels = ramp();
        let view = SamplerView::new(&texels, Resolution::new(2, 2), FilterMode::Nearest);
        assert_eq!(view.sample(Vec2::new(0.1, 0.1))[0], 0.0);
        assert_eq!(view.sample(Vec2::new(0.9, 0.1))[0], 1.0);
        assert_eq!(view.sample(Vec2::new(0.9, 0.9))[0], 3.0);
    }

    #[test]
    fn linear_blends_between_centers() {
        let texels = ramp();
        let view = SamplerView::new(&texels, Resolution::new(2, 2), FilterMode::Linear);
        let center = view.sample(Vec2::new(0.5, 0.5))[0];
        assert!((center - 1.5).abs() < 1e-6);
        // texel centers reproduce stored values
        assert!((view.sample(Vec2::new(0.75, 0.25))[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn outside_clamps_to_edge() {
        let texels = ramp();
        let view = SamplerView::new(&texels, Resolution::new(2, 2), FilterMode::Linear);
        assert!((view.sample(Vec2::new(-3.0, -3.0))[0]).abs() < 1e-6);
        assert!((view.sample(Vec2::new(4.0, 4.0))[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn unbound_unit_reads_opaque_black() {
        assert_eq!(sample(&None, Vec2::new(0.5, 0.5)), UNBOUND_TEXEL);
    }
}
