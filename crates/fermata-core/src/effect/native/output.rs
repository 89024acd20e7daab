//! Output stage - final volume before the device
//!
//! Sits at the end of both the playback and live-input chains. Pan is fixed
//! at center; the field exists so the stage matches the mixer shape, but no
//! parameter exposes it.

use crate::effect::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::StereoBuffer;

/// Default output volume for the live-input path.
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Final gain stage.
///
/// Parameters:
/// - Volume: 0..1 linear
pub struct OutputStage {
    base: EffectBase,
    /// Fixed at 0.0 (center).
    pan: f32,
}

impl OutputStage {
    pub fn new() -> Self {
        let info = EffectInfo::new("Output", "Mixer")
            .with_param(ParamInfo::new("Volume", DEFAULT_VOLUME).with_range(0.0, 1.0));
        Self {
            base: EffectBase::new(info),
            pan: 0.0,
        }
    }

    pub fn volume(&self) -> f32 {
        self.base.param_actual(0)
    }

    /// Set the output volume, clamped to 0..1.
    pub fn set_volume(&mut self, volume: f32) {
        self.set_param_actual(0, volume);
    }
}

impl Default for OutputStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for OutputStage {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() {
            return;
        }
        debug_assert_eq!(self.pan, 0.0);
        buffer.scale(self.volume());
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn get_params(&self) -> &[ParamValue] {
        self.base.get_params()
    }

    fn set_param(&mut self, index: usize, value: f32) {
        self.base.set_param(index, value);
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.base.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        // Stateless
    }
}
