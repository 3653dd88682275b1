//! Stall watchdog for the active transfer.
//!
//! A single worker thread parks on a condvar until a deadline is armed,
//! then either fires once or goes back to sleep when the deadline is
//! cancelled or replaced. Each arming carries a generation number chosen by
//! the caller; the fire callback receives it so a fire that lost the race
//! against a newly arrived packet can be recognized as stale.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct WatchdogState {
    /// Deadline of the pending arming, if any.
    deadline: Option<Instant>,
    /// Generation of the pending arming.
    generation: u64,
    shutdown: bool,
}

/// Rearmable, cancelable single-shot timer.
///
/// At most one arming is pending at any instant; `arm` replaces the
/// previous deadline and `cancel` clears it. Dropping the monitor stops the
/// worker thread.
pub struct TimeoutMonitor {
    shared: Arc<(Mutex<WatchdogState>, Condvar)>,
    duration: Duration,
    worker: Option<JoinHandle<()>>,
}

impl TimeoutMonitor {
    /// Spawn the watchdog thread. `on_fire` runs on that thread, once per
    /// expired arming, with the generation the arming carried.
    pub fn spawn<F>(duration: Duration, on_fire: F) -> Self
    where
        F: Fn(u64) + Send + 'static,
    {
        let shared = Arc::new((
            Mutex::new(WatchdogState {
                deadline: None,
                generation: 0,
                shutdown: false,
            }),
            Condvar::new(),
        ));
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("downlink-watchdog".into())
            .spawn(move || watchdog_loop(worker_shared, on_fire))
            .expect("failed to spawn watchdog thread");

        Self {
            shared,
            duration,
            worker: Some(worker),
        }
    }

    /// Schedule a fire one timeout duration from now, tagged with
    /// `generation`. Replaces any pending arming.
    pub fn arm(&self, generation: u64) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();
        state.deadline = Some(Instant::now() + self.duration);
        state.generation = generation;
        cvar.notify_all();
    }

    /// Suppress a pending fire. Best-effort: a fire already in flight on the
    /// worker thread is not unwound.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();
        state.deadline = None;
        cvar.notify_all();
    }
}

impl Drop for TimeoutMonitor {
    fn drop(&mut self) {
        {
            let (lock, cvar) = &*self.shared;
            let mut state = lock.lock().unwrap();
            state.shutdown = true;
            state.deadline = None;
            cvar.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn watchdog_loop<F: Fn(u64)>(shared: Arc<(Mutex<WatchdogState>, Condvar)>, on_fire: F) {
    let (lock, cvar) = &*shared;
    let mut state = lock.lock().unwrap();
    loop {
        if state.shutdown {
            return;
        }
        match state.deadline {
            None => {
                state = cvar.wait(state).unwrap();
            }
            Some(deadline) => {
                let now = Instant::now();
                if now < deadline {
                    let (next, _) = cvar.wait_timeout(state, deadline - now).unwrap();
                    state = next;
                } else {
                    let generation = state.generation;
                    state.deadline = None;
                    // Release the watchdog lock while the callback runs; it
                    // takes the decoder lock and must not nest under ours.
                    drop(state);
                    on_fire(generation);
                    state = lock.lock().unwrap();
                }
            }
        }
    }
}
