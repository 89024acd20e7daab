//! Built-in effect stages

mod eq;
mod gain;
mod output;
mod reverb;
mod upmix;

pub use eq::EqEffect;
pub use gain::{GainStage, DEFAULT_GAIN_DB, MAX_GAIN_DB, MIN_GAIN_DB};
pub use output::{OutputStage, DEFAULT_VOLUME};
pub use reverb::ReverbEffect;
pub use upmix::UpmixStage;
