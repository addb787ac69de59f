use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, EngineResult};

use super::color::Rgb;

/// Solver and compositing settings, fixed for one simulation instance.
///
/// JSON uses camelCase keys; missing keys take the defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationConfig {
    /// Cells along the longer surface edge for velocity, curl, divergence, pressure
    pub sim_resolution: u32,
    /// Cells along the longer surface edge for dye
    pub dye_resolution: u32,
    /// Splat falloff radius, in percent of the domain
    pub splat_radius: f32,
    /// Vorticity confinement strength
    pub curl_strength: f32,
    pub pressure_dissipation: f32,
    pub velocity_dissipation: f32,
    pub density_dissipation: f32,
    /// Jacobi iterations per step
    pub pressure_iterations: u32,
    pub transparent_background: bool,
    /// 0-255 per channel, used only when the background is opaque
    pub background_color: Rgb,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 512,
            splat_radius: 5.0,
            curl_strength: 30.0,
            pressure_dissipation: 0.8,
            velocity_dissipation: 0.98,
            density_dissipation: 0.97,
            pressure_iterations: 20,
            transparent_background: false,
            background_color: Rgb::new(0.0, 0.0, 0.0),
        }
    }
}

impl SimulationConfig {
    /// Parse and validate
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn validate(&self) -> EngineResult<()> {
        let invalid = |msg: String| Err(EngineError::InvalidConfig(msg));

        if self.sim_resolution == 0 {
            return invalid("simResolution must be at least 1".to_string());
        }
        if self.dye_resolution == 0 {
            return invalid("dyeResolution must be at least 1".to_string());
        }
        if self.pressure_iterations == 0 {
            return invalid("pressureIterations must be at least 1".to_string());
        }
        for (name, value) in [
            ("pressureDissipation", self.pressure_dissipation),
            ("velocityDissipation", self.velocity_dissipation),
            ("densityDissipation", self.density_dissipation),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return invalid(format!("{name} must be in (0, 1], got {value}"));
            }
        }
        if !(self.curl_strength.is_finite() && self.curl_strength >= 0.0) {
            return invalid(format!("curlStrength must be >= 0, got {}", self.curl_strength));
        }
        let r = self.splat_radius_uv();
        if !(self.splat_radius.is_finite() && self.splat_radius > 0.0 && (r * r).is_normal()) {
            return invalid(format!("splatRadius must be > 0, got {}", self.splat_radius));
        }
        let bg = self.background_color;
        if [bg.r, bg.g, bg.b].iter().any(|c| !(0.0..=255.0).contains(c)) {
            return invalid("backgroundColor channels must be in 0..=255".to_string());
        }
        Ok(())
    }

    /// Falloff radius in UV units as the splat kernel expects it
    #[inline]
    pub fn splat_radius_uv(&self) -> f32 {
        self.splat_radius / 100.0
    }

    /// Background fill color in [0, 1], opaque
    pub fn background_rgba(&self) -> [f32; 4] {
        let bg = self.background_color;
        [bg.r / 255.0, bg.g / 255.0, bg.b / 255.0, 1.0]
    }
}
