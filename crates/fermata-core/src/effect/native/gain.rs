//! Input gain stage - clean pre-amplification in dB
//!
//! The live-input path runs this ahead of the EQ. It is a distortion-capable
//! stage run permanently in clean mode: the distortion wet mix is zero and
//! only the pre-gain is applied.

use crate::effect::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::{db_to_linear, StereoBuffer};

/// Pre-gain range in dB for the live-input path.
pub const MIN_GAIN_DB: f32 = -30.0;
pub const MAX_GAIN_DB: f32 = 15.0;

/// Default pre-gain in dB.
pub const DEFAULT_GAIN_DB: f32 = -15.0;

/// Clean pre-gain stage.
///
/// Parameters:
/// - Pre-Gain: -30..+15 dB
pub struct GainStage {
    base: EffectBase,
}

impl GainStage {
    pub fn new() -> Self {
        let info = EffectInfo::new("Pre-Gain", "Amp").with_param(
            ParamInfo::new("Pre-Gain", default_normalized())
                .with_range(MIN_GAIN_DB, MAX_GAIN_DB)
                .with_unit("dB"),
        );
        Self {
            base: EffectBase::new(info),
        }
    }

    /// Current pre-gain in dB.
    pub fn gain_db(&self) -> f32 {
        self.base.param_actual(0)
    }

    /// Set the pre-gain in dB, clamped to the stage range.
    pub fn set_gain_db(&mut self, db: f32) {
        self.set_param_actual(0, db);
    }
}

fn default_normalized() -> f32 {
    (DEFAULT_GAIN_DB - MIN_GAIN_DB) / (MAX_GAIN_DB - MIN_GAIN_DB)
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for GainStage {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() {
            return;
        }
        buffer.scale(db_to_linear(self.gain_db()));
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
