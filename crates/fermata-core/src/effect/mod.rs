//! Effect system - trait, parameter metadata, and ordered chains
//!
//! Every processing stage (gain, EQ, reverb, upmix, output) implements
//! [`Effect`]: in-place processing over a `StereoBuffer`, normalized 0..1
//! parameters with declared ranges, per-stage bypass, and a reset hook called
//! on track load. The time-pitch stage is not an `Effect` because it changes
//! buffer length; the transport owns it separately, mirroring how the engine
//! treats time-stretching as part of frame gathering rather than the chain.

pub mod native;

use crate::types::StereoBuffer;

/// Information about an effect parameter.
#[derive(Debug, Clone)]
pub struct ParamInfo {
    /// Parameter name for display.
    pub name: String,
    /// Default value (normalized 0.0-1.0).
    pub default: f32,
    /// Minimum actual value.
    pub min: f32,
    /// Maximum actual value.
    pub max: f32,
    /// Unit label (e.g. "dB", "%").
    pub unit: String,
}

impl Default for ParamInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            default: 0.5,
            min: 0.0,
            max: 1.0,
            unit: String::new(),
        }
    }
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            default,
            ..Default::default()
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Map an actual value into the normalized 0..1 range, clamped.
    pub fn normalize(&self, actual: f32) -> f32 {
        if (self.max - self.min).abs() < f32::EPSILON {
            return 0.0;
        }
        ((actual - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

/// Current parameter value in both normalized and actual form.
#[derive(Debug, Clone, Copy)]
pub struct ParamValue {
    pub normalized: f32,
    pub actual: f32,
}

impl ParamValue {
    pub fn from_normalized(normalized: f32, info: &ParamInfo) -> Self {
        let normalized = normalized.clamp(0.0, 1.0);
        let actual = info.min + normalized * (info.max - info.min);
        Self { normalized, actual }
    }
}

/// Static information about an effect stage.
#[derive(Debug, Clone)]
pub struct EffectInfo {
    pub name: String,
    pub category: String,
    pub params: Vec<ParamInfo>,
    /// Processing latency in samples.
    pub latency_samples: u32,
}

impl EffectInfo {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            params: Vec::new(),
            latency_samples: 0,
        }
    }

    pub fn with_param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// The core effect trait.
///
/// Parameters are normalized 0..1 against the ranges declared in
/// [`EffectInfo`]; setters outside the range clamp to the nearest boundary.
pub trait Effect: Send {
    /// Process a stereo buffer in place.
    fn process(&mut self, buffer: &mut StereoBuffer);

    /// Latency contributed by this stage, in samples.
    fn latency_samples(&self) -> u32 {
        0
    }

    fn info(&self) -> &EffectInfo;

    fn get_params(&self) -> &[ParamValue];

    /// Set a parameter by index (normalized 0.0-1.0).
    fn set_param(&mut self, index: usize, value: f32);

    /// Set a parameter by index using the actual (denormalized) value.
    /// Out-of-range values clamp to the declared boundary.
    fn set_param_actual(&mut self, index: usize, actual: f32) {
        if let Some(info) = self.info().params.get(index) {
            let normalized = info.normalize(actual);
            self.set_param(index, normalized);
        }
    }

    fn set_bypass(&mut self, bypass: bool);

    fn is_bypassed(&self) -> bool;

    /// Reset internal state (called on track load and chain setup).
    fn reset(&mut self);
}

/// Shared implementation helper: bypass flag and parameter storage.
#[derive(Debug, Clone)]
pub struct EffectBase {
    info: EffectInfo,
    params: Vec<ParamValue>,
    bypassed: bool,
}

impl EffectBase {
    pub fn new(info: EffectInfo) -> Self {
        let params = info
            .params
            .iter()
            .map(|p| ParamValue::from_normalized(p.default, p))
            .collect();
        Self {
            info,
            params,
            bypassed: false,
        }
    }

    pub fn info(&self) -> &EffectInfo {
        &self.info
    }

    pub fn get_params(&self) -> &[ParamValue] {
        &self.params
    }

    pub fn set_param(&mut self, index: usize, value: f32) {
        if index < self.params.len() {
            self.params[index] = ParamValue::from_normalized(value, &self.info.params[index]);
        }
    }

    /// Actual (denormalized) value of a parameter.
    pub fn param_actual(&self, index: usize) -> f32 {
        self.params.get(index).map(|p| p.actual).unwrap_or(0.0)
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypassed = bypass;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}

/// An ordered chain of effect stages processed in sequence.
///
/// Stage order is fixed at construction; reconfiguration happens through
/// typed setters on the stages (routed by index), which the engine applies
/// between render buffers so every change is atomic with respect to audio.
pub struct EffectChain {
    stages: Vec<Box<dyn Effect>>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage. Returns its index for later addressing.
    pub fn push(&mut self, stage: Box<dyn Effect>) -> usize {
        self.stages.push(stage);
        self.stages.len() - 1
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run the buffer through every stage in order. Bypassed stages are
    /// skipped inside their own `process`.
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        for stage in &mut self.stages {
            stage.process(buffer);
        }
    }

    /// Reset every stage's internal state.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Total latency of the chain in samples.
    pub fn total_latency(&self) -> u32 {
        self.stages.iter().map(|s| s.latency_samples()).sum()
    }

    pub fn stage(&self, index: usize) -> Option<&dyn Effect> {
        self.stages.get(index).map(|s| s.as_ref())
    }

    pub fn stage_mut(&mut self, index: usize) -> Option<&mut (dyn Effect + '_)> {
        match self.stages.get_mut(index) {
            Some(s) => Some(s.as_mut()),
            None => None,
        }
    }

    /// Set a stage parameter by actual value.
    pub fn set_param_actual(&mut self, stage: usize, param: usize, actual: f32) {
        if let Some(s) = self.stages.get_mut(stage) {
            s.set_param_actual(param, actual);
        }
    }

    pub fn set_bypass(&mut self, stage: usize, bypass: bool) {
        if let Some(s) = self.stages.get_mut(stage) {
            s.set_bypass(bypass);
        }
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_normalization_roundtrip() {
        let info = ParamInfo::new("Gain", 0.5).with_range(-30.0, 15.0).with_unit("dB");
        let normalized = info.normalize(-7.5);
        let value = ParamValue::from_normalized(normalized, &info);
        assert!((value.actual - -7.5).abs() < 0.001);
    }

    #[test]
    fn out_of_range_actual_clamps_to_boundary() {
        let info = ParamInfo::new("Gain", 0.5).with_range(-30.0, 15.0);
        assert_eq!(info.normalize(100.0), 1.0);
        assert_eq!(info.normalize(-100.0), 0.0);
    }

    #[test]
    fn chain_processes_stages_in_order() {
        use crate::types::StereoSample;

        let mut chain = EffectChain::new();
        chain.push(Box::new(native::OutputStage::new()));
        chain.set_param_actual(0, 0, 0.5); // volume

        let mut buffer = StereoBuffer::from_vec(vec![StereoSample::mono(1.0); 4]);
        chain.process(&mut buffer);
        assert!((buffer[0].left - 0.5).abs() < 0.001);
    }
}
