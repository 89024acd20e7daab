//! Repeating control-thread timer
//!
//! The loop watchdog and the level meter both run off fixed-interval ticks.
//! The timer is just a thread and a stop flag; the tick logic itself lives in
//! plain methods on the controller so tests can drive it directly without
//! sleeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// A repeating timer that calls a closure until dropped.
pub struct PollTimer {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl PollTimer {
    /// Spawn a thread calling `tick` every `interval`.
    pub fn spawn(name: &str, interval: Duration, mut tick: impl FnMut() + Send + 'static) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    std::thread::sleep(interval);
                    if stop_flag.load(Ordering::Relaxed) {
                        break;
                    }
                    tick();
                }
            })
            .expect("spawn timer thread");

        Self {
            stop,
            join: Some(join),
        }
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
