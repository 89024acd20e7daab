//! Stereo reverb stage
//!
//! Freeverb-style algorithmic reverb: parallel comb filters feed a serial
//! allpass diffusion stage, with the right channel delay lines offset for
//! stereo spread. Based on the Freeverb algorithm by Jezar at Dreampoint.
//!
//! The single user-facing Amount parameter is the wet mix; at 0 the stage is
//! an exact passthrough. Output is always stereo even for a mono-derived
//! input, since the spread offsets decorrelate the channels.

use crate::effect::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::{StereoBuffer, SAMPLE_RATE};

/// Comb filter delay line lengths (in samples at 44.1kHz).
/// Prime-ish numbers to avoid resonances.
const COMB_LENGTHS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];

/// Allpass filter delay line lengths.
const ALLPASS_LENGTHS: [usize; 4] = [225, 556, 441, 341];

/// Scaling factor for sample rate differences from 44.1kHz.
const SR_SCALE: f32 = SAMPLE_RATE as f32 / 44100.0;

struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl CombFilter {
    fn new(length: usize) -> Self {
        let scaled_len = ((length as f32 * SR_SCALE) as usize).max(1);
        Self {
            buffer: vec![0.0; scaled_len],
            pos: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.pos];

        // One-pole lowpass for high-frequency damping
        self.filter_state = output * (1.0 - damp) + self.filter_state * damp;

        self.buffer[self.pos] = input + self.filter_state * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();

        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
    }
}

struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(length: usize) -> Self {
        let scaled_len = ((length as f32 * SR_SCALE) as usize).max(1);
        Self {
            buffer: vec![0.0; scaled_len],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        let output = -input + buffered;
        self.buffer[self.pos] = input + buffered * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
    }
}

/// Freeverb-style stereo reverb.
///
/// Parameters:
/// - Amount: wet mix (0.0 = passthrough, 1.0 = full wet)
/// - Room Size: reverb decay time
/// - Damping: high frequency damping (0.0 = bright, 1.0 = dark)
pub struct ReverbEffect {
    base: EffectBase,
    combs_l: Vec<CombFilter>,
    /// Right channel comb filters (offset for stereo)
    combs_r: Vec<CombFilter>,
    allpass_l: Vec<AllpassFilter>,
    allpass_r: Vec<AllpassFilter>,
}

impl ReverbEffect {
    /// Stereo spread offset for right channel delay lines (in samples).
    const STEREO_SPREAD: usize = 23;

    pub fn new() -> Self {
        let info = EffectInfo::new("Reverb", "Reverb")
            .with_param(ParamInfo::new("Amount", 0.0).with_range(0.0, 1.0))
            .with_param(ParamInfo::new("Room Size", 0.5).with_range(0.0, 1.0))
            .with_param(ParamInfo::new("Damping", 0.5).with_range(0.0, 1.0));

        let combs_l: Vec<_> = COMB_LENGTHS.iter().map(|&len| CombFilter::new(len)).collect();
        let combs_r: Vec<_> = COMB_LENGTHS
            .iter()
            .map(|&len| CombFilter::new(len + Self::STEREO_SPREAD))
            .collect();

        let allpass_l: Vec<_> = ALLPASS_LENGTHS.iter().map(|&len| AllpassFilter::new(len)).collect();
        let allpass_r: Vec<_> = ALLPASS_LENGTHS
            .iter()
            .map(|&len| AllpassFilter::new(len + Self::STEREO_SPREAD))
            .collect();

        Self {
            base: EffectBase::new(info),
            combs_l,
            combs_r,
            allpass_l,
            allpass_r,
        }
    }

    /// Wet mix in 0..1.
    pub fn amount(&self) -> f32 {
        self.base.param_actual(0)
    }

    /// Set the wet mix, clamped to 0..1.
    pub fn set_amount(&mut self, amount: f32) {
        self.set_param_actual(0, amount);
    }

    pub fn set_room_size(&mut self, size: f32) {
        self.set_param_actual(1, size);
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.set_param_actual(2, damping);
    }

    /// Comb feedback derived from room size (0.7-0.98).
    fn feedback(&self) -> f32 {
        0.7 + self.base.param_actual(1) * 0.28
    }

    fn damping(&self) -> f32 {
        self.base.param_actual(2)
    }
}

impl Default for ReverbEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for ReverbEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() {
            return;
        }

        let wet = self.amount();
        if wet <= 0.0 {
            // Keep the delay lines cold so raising the amount later does not
            // release a stale tail
            return;
        }
        let dry = 1.0 - wet;

        let feedback = self.feedback();
        let damp = self.damping();

        const ALLPASS_FEEDBACK: f32 = 0.5;

        // Gain compensation for summing eight parallel combs
        const COMB_GAIN: f32 = 0.2;

        for sample in buffer.iter_mut() {
            let input = (sample.left + sample.right) * 0.5;

            let mut out_l = 0.0f32;
            let mut out_r = 0.0f32;

            for comb in &mut self.combs_l {
                out_l += comb.process(input, feedback, damp);
            }
            for comb in &mut self.combs_r {
                out_r += comb.process(input, feedback, damp);
            }

            out_l *= COMB_GAIN;
            out_r *= COMB_GAIN;

            for ap in &mut self.allpass_l {
                out_l = ap.process(out_l, ALLPASS_FEEDBACK);
            }
            for ap in &mut self.allpass_r {
                out_r = ap.process(out_r, ALLPASS_FEEDBACK);
            }

            sample.left = out_l * wet + sample.left * dry;
            sample.right = out_r * wet + sample.right * dry;
        }
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
        for comb in &mut self.combs_l {
            comb.reset();
        }
        for comb in &mut self.combs_r {
            comb.reset();
        }
        for ap in &mut self.allpass_l {
            ap.reset();
        }
        for ap in &mut self.allpass_r {
            ap.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn default_amount_is_zero() {
        let effect = ReverbEffect::new();
        assert_eq!(effect.amount(), 0.0);
        assert_eq!(effect.info().param_count(), 3);
    }

    #[test]
    fn zero_amount_is_exact_passthrough() {
        let mut effect = ReverbEffect::new();

        let mut buffer = StereoBuffer::silence(64);
        buffer.as_mut_slice()[0] = StereoSample::new(1.0, 0.5);

        effect.process(&mut buffer);

        assert_eq!(buffer[0].left, 1.0);
        assert_eq!(buffer[0].right, 0.5);
        assert!(buffer.iter().skip(1).all(|s| s.left == 0.0 && s.right == 0.0));
    }

    #[test]
    fn impulse_produces_decaying_tail() {
        let mut effect = ReverbEffect::new();
        effect.set_amount(1.0);

        let mut buffer = StereoBuffer::silence(8192);
        buffer.as_mut_slice()[0] = StereoSample::new(1.0, 1.0);

        effect.process(&mut buffer);

        // Energy appears after the shortest comb delay (1116 samples at
        // 44.1kHz, ~1213 at 48kHz)
        let tail_energy: f32 = buffer.iter().skip(1500).map(|s| s.left.abs()).sum();
        assert!(tail_energy > 0.0);
    }

    #[test]
    fn mono_input_decorrelates_into_stereo() {
        let mut effect = ReverbEffect::new();
        effect.set_amount(1.0);

        let mut buffer = StereoBuffer::silence(8192);
        buffer.as_mut_slice()[0] = StereoSample::mono(1.0);

        effect.process(&mut buffer);

        let diff_count = buffer
            .iter()
            .skip(1500)
            .filter(|s| (s.left - s.right).abs() > 0.0001)
            .count();
        assert!(diff_count > 0);
    }

    #[test]
    fn reset_clears_the_tail() {
        let mut effect = ReverbEffect::new();
        effect.set_amount(1.0);

        let mut buffer = StereoBuffer::silence(4096);
        for s in buffer.iter_mut() {
            *s = StereoSample::mono(1.0);
        }
        effect.process(&mut buffer);

        effect.reset();

        let mut buffer = StereoBuffer::silence(64);
        effect.process(&mut buffer);
        let energy: f32 = buffer.iter().map(|s| s.left.abs() + s.right.abs()).sum();
        assert!(energy < 1e-6);
    }
}
