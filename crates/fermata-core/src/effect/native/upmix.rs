//! Mono-to-stereo upmix stage
//!
//! The live-input capture path writes a single-channel signal into the left
//! slot of each frame. This stage runs first in the input chain and, when the
//! source is mono, copies left into right so every downstream stage sees a
//! true stereo signal. For stereo sources it passes through untouched.

use crate::effect::{Effect, EffectBase, EffectInfo, ParamValue};
use crate::types::StereoBuffer;

/// Explicit mono-to-stereo duplication stage. No parameters.
pub struct UpmixStage {
    base: EffectBase,
    mono_source: bool,
}

impl UpmixStage {
    pub fn new() -> Self {
        Self {
            base: EffectBase::new(EffectInfo::new("Upmix", "Routing")),
            mono_source: true,
        }
    }

    /// Whether the incoming signal is mono-in-left.
    pub fn set_mono_source(&mut self, mono: bool) {
        self.mono_source = mono;
    }

    pub fn is_mono_source(&self) -> bool {
        self.mono_source
    }
}

impl Default for UpmixStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for UpmixStage {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() || !self.mono_source {
            return;
        }
        for frame in buffer.iter_mut() {
            frame.right = frame.left;
        }
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn get_params(&self) -> &[ParamValue] {
        self.base.get_params()
    }

    fn set_param(&mut self, _index: usize, _value: f32) {}

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn mono_source_duplicates_left_into_right() {
        let mut stage = UpmixStage::new();
        let mut buffer = StereoBuffer::from_vec(vec![StereoSample::new(0.4, 0.0); 4]);
        stage.process(&mut buffer);
        assert!(buffer.iter().all(|s| s.left == 0.4 && s.right == 0.4));
    }

    #[test]
    fn stereo_source_passes_through() {
        let mut stage = UpmixStage::new();
        stage.set_mono_source(false);
        let mut buffer = StereoBuffer::from_vec(vec![StereoSample::new(0.4, -0.2); 4]);
        stage.process(&mut buffer);
        assert!(buffer.iter().all(|s| s.left == 0.4 && s.right == -0.2));
    }
}
