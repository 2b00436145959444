//! Single-slot debounce timer.
//!
//! One thread per watched root owns at most one pending deadline. Arming the
//! timer replaces the deadline instead of queueing another expiry, so a
//! continuous burst never fires until it pauses for the full delay.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvError, Sender, select, unbounded};

use super::WatchError;

#[derive(Debug)]
enum TimerCommand {
    Arm,
}

/// Handle used to (re)arm a running debounce timer.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    commands: Sender<TimerCommand>,
}

impl DebounceTimer {
    /// Spawn the timer thread.
    ///
    /// `on_fire` runs on the timer thread each time the delay elapses without
    /// a new `arm()`. The thread exits when `shutdown` is closed or every
    /// `DebounceTimer` handle has been dropped.
    pub fn spawn<F>(
        name: &str,
        delay: Duration,
        shutdown: Receiver<()>,
        on_fire: F,
    ) -> Result<(Self, JoinHandle<()>), WatchError>
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = unbounded();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(delay, &rx, &shutdown, on_fire))
            .map_err(|e| WatchError::ThreadSpawn {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok((Self { commands: tx }, handle))
    }

    /// Restart the countdown from now.
    pub fn arm(&self) {
        // Send only fails once the timer thread is gone, i.e. after shutdown.
        let _ = self.commands.send(TimerCommand::Arm);
    }
}

enum Wake {
    Command(Result<TimerCommand, RecvError>),
    Expired,
    Shutdown,
}

fn run<F: Fn()>(
    delay: Duration,
    commands: &Receiver<TimerCommand>,
    shutdown: &Receiver<()>,
    on_fire: F,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let wake = match deadline {
            None => select! {
                recv(commands) -> msg => Wake::Command(msg),
                recv(shutdown) -> _ => Wake::Shutdown,
            },
            Some(at) => select! {
                recv(commands) -> msg => Wake::Command(msg),
                recv(shutdown) -> _ => Wake::Shutdown,
                default(at.saturating_duration_since(Instant::now())) => Wake::Expired,
            },
        };

        match wake {
            Wake::Command(Ok(TimerCommand::Arm)) => deadline = Some(Instant::now() + delay),
            Wake::Expired => {
                deadline = None;
                on_fire();
            }
            Wake::Command(Err(_)) | Wake::Shutdown => break,
        }
    }

    tracing::trace!("[watcher] debounce timer exiting");
}
