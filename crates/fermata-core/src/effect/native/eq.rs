//! 8-band parametric EQ stage
//!
//! Band 0 is a high-pass, bands 1-6 are peaking filters, band 7 is a
//! high-shelf, at fixed center frequencies from 60 Hz to 12 kHz. Gains are
//! clamped to the profile range; only the band whose gain changed is
//! recomputed.
//!
//! Filters are RBJ cookbook biquads with independent per-channel state.

use crate::effect::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::eq::{BandConfig, BandShape, BAND_COUNT, MAX_BAND_GAIN_DB, MIN_BAND_GAIN_DB};
use crate::types::{StereoBuffer, SAMPLE_RATE};

/// One biquad section with stereo state (transposed direct form II).
#[derive(Debug, Clone, Copy, Default)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1_l: f32,
    z2_l: f32,
    z1_r: f32,
    z2_r: f32,
}

impl Biquad {
    #[inline]
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let out_l = self.b0 * left + self.z1_l;
        self.z1_l = self.b1 * left - self.a1 * out_l + self.z2_l;
        self.z2_l = self.b2 * left - self.a2 * out_l;

        let out_r = self.b0 * right + self.z1_r;
        self.z1_r = self.b1 * right - self.a1 * out_r + self.z2_r;
        self.z2_r = self.b2 * right - self.a2 * out_r;

        (out_l, out_r)
    }

    fn reset(&mut self) {
        self.z1_l = 0.0;
        self.z2_l = 0.0;
        self.z1_r = 0.0;
        self.z2_r = 0.0;
    }

    fn set(&mut self, b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) {
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }
}

/// Compute biquad coefficients for one band at the given gain.
fn configure_band(filter: &mut Biquad, config: &BandConfig, gain_db: f32) {
    let w0 = std::f32::consts::TAU * config.frequency / SAMPLE_RATE as f32;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let ln2_half = std::f32::consts::LN_2 / 2.0;

    match config.shape {
        BandShape::HighPass => {
            // Gain has no effect on the high-pass shape; Q derives from the
            // configured bandwidth
            let q = 1.0 / (2.0 * (ln2_half * config.bandwidth).sinh());
            let alpha = sin_w0 / (2.0 * q);
            filter.set(
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            );
        }
        BandShape::Peaking => {
            let a = 10.0f32.powf(gain_db / 40.0);
            let alpha = sin_w0 * (ln2_half * config.bandwidth * w0 / sin_w0).sinh();
            filter.set(
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            );
        }
        BandShape::HighShelf => {
            let a = 10.0f32.powf(gain_db / 40.0);
            // Shelf slope fixed at 1
            let alpha = sin_w0 / 2.0 * std::f32::consts::SQRT_2;
            let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
            filter.set(
                a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
            );
        }
    }
}

/// The 8-band EQ stage.
pub struct EqEffect {
    base: EffectBase,
    configs: [BandConfig; BAND_COUNT],
    filters: [Biquad; BAND_COUNT],
}

impl EqEffect {
    pub fn new() -> Self {
        let configs = BandConfig::default_bands();

        let mut info = EffectInfo::new("8-Band EQ", "EQ");
        for config in &configs {
            info = info.with_param(
                ParamInfo::new(config.label, 0.5)
                    .with_range(MIN_BAND_GAIN_DB, MAX_BAND_GAIN_DB)
                    .with_unit("dB"),
            );
        }

        let mut eq = Self {
            base: EffectBase::new(info),
            configs,
            filters: [Biquad::default(); BAND_COUNT],
        };
        for i in 0..BAND_COUNT {
            configure_band(&mut eq.filters[i], &eq.configs[i], 0.0);
        }
        eq
    }

    /// Gain of one band in dB.
    pub fn band_gain_db(&self, index: usize) -> f32 {
        self.base.param_actual(index)
    }

    /// Set one band's gain in dB (clamped) and recompute only that filter.
    pub fn set_band_gain_db(&mut self, index: usize, gain_db: f32) {
        if index >= BAND_COUNT {
            return;
        }
        self.set_param_actual(index, gain_db);
    }

    /// Apply a full 8-gain profile snapshot.
    pub fn apply_profile(&mut self, gains: &[f32; BAND_COUNT]) {
        for (i, &gain) in gains.iter().enumerate() {
            self.set_band_gain_db(i, gain);
        }
    }
}

impl Default for EqEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for EqEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() {
            return;
        }
        for frame in buffer.iter_mut() {
            let mut l = frame.left;
            let mut r = frame.right;
            for filter in &mut self.filters {
                let (nl, nr) = filter.process(l, r);
                l = nl;
                r = nr;
            }
            frame.left = l;
            frame.right = r;
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
        if index < BAND_COUNT {
            let gain_db = self.base.param_actual(index);
            configure_band(&mut self.filters[index], &self.configs[index], gain_db);
        }
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.base.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn band_gain_clamps_to_range() {
        let mut eq = EqEffect::new();
        eq.set_band_gain_db(3, 40.0);
        assert_eq!(eq.band_gain_db(3), MAX_BAND_GAIN_DB);
        eq.set_band_gain_db(3, -40.0);
        assert_eq!(eq.band_gain_db(3), MIN_BAND_GAIN_DB);
    }

    #[test]
    fn flat_profile_is_near_transparent_at_midband() {
        let mut eq = EqEffect::new();
        // 1 kHz sine, well above the 60 Hz high-pass corner
        let mut buffer = StereoBuffer::silence(4096);
        for (i, frame) in buffer.iter_mut().enumerate() {
            let t = i as f32 / SAMPLE_RATE as f32;
            *frame = StereoSample::mono((t * 1000.0 * std::f32::consts::TAU).sin() * 0.5);
        }
        let input_rms = buffer.rms();
        eq.process(&mut buffer);
        let output_rms = buffer.rms();
        assert!((output_rms - input_rms).abs() / input_rms < 0.05);
    }

    #[test]
    fn boosted_band_raises_level_at_its_frequency() {
        let mut eq = EqEffect::new();
        eq.set_band_gain_db(4, 12.0); // 1 kHz band

        let mut buffer = StereoBuffer::silence(8192);
        for (i, frame) in buffer.iter_mut().enumerate() {
            let t = i as f32 / SAMPLE_RATE as f32;
            *frame = StereoSample::mono((t * 1000.0 * std::f32::consts::TAU).sin() * 0.1);
        }
        let input_rms = buffer.rms();
        eq.process(&mut buffer);
        // +12 dB is a 3.98x amplitude gain; allow settle slack
        assert!(buffer.rms() > input_rms * 2.5);
    }

    #[test]
    fn apply_profile_sets_every_band() {
        let mut eq = EqEffect::new();
        let gains = [2.0, 1.0, -1.0, 3.0, 2.0, 4.0, 3.0, 2.0];
        eq.apply_profile(&gains);
        for (i, &g) in gains.iter().enumerate() {
            assert!((eq.band_gain_db(i) - g).abs() < 0.01);
        }
    }
}
