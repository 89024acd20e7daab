//! Playback engine
//!
//! Split along the thread boundary: [`AudioEngine`] and everything it owns
//! run inside the output stream callback, [`PlayerController`] runs on the
//! control thread. The two sides share only the command ring and the atomics.

mod command;
#[allow(clippy::module_inception)]
mod engine;
mod input;
mod player;
mod timer;
mod transport;

pub use command::{command_channel, EngineCommand, LoadRequest, COMMAND_QUEUE_CAPACITY};
pub use engine::{AudioEngine, BUFFER_SIZE};
pub use input::{InputAtomics, LiveInput};
pub use player::{
    start_timers, PlayerController, PlayerSnapshot, METER_INTERVAL, METER_WINDOW, POLL_INTERVAL,
};
pub use timer::PollTimer;
pub use transport::{PlayState, Transport, TransportAtomics};
