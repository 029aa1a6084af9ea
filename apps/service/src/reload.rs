//! Triggers for re-reading the config file: SIGHUP, or a changed
//! modification time seen by polling.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::{Interval, MissedTickBehavior, interval};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    Signal,
    FileChanged,
}

pub struct ConfigWatcher {
    path: PathBuf,
    modified: Option<SystemTime>,
    poll: Option<Interval>,
    hangup: Hangup,
}

impl ConfigWatcher {
    /// Watch `path`; a zero `poll_every` disables polling
    pub fn new(path: PathBuf, poll_every: Duration) -> std::io::Result<Self> {
        let poll = (!poll_every.is_zero()).then(|| {
            let mut poll = interval(poll_every);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            poll
        });

        Ok(Self { modified: modified(&path), path, poll, hangup: Hangup::new()? })
    }

    /// Wait until the config should be reloaded
    pub async fn changed(&mut self) -> ReloadReason {
        loop {
            tokio::select! {
                _ = self.hangup.recv() => {
                    self.modified = modified(&self.path);
                    return ReloadReason::Signal;
                }
                _ = tick(&mut self.poll) => {
                    let current = modified(&self.path);
                    if current != self.modified {
                        self.modified = current;
                        return ReloadReason::FileChanged;
                    }
                }
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

async fn tick(poll: &mut Option<Interval>) {
    match poll {
        Some(poll) => {
            poll.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(unix)]
struct Hangup(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Hangup {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self(signal(SignalKind::hangup())?))
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
struct Hangup;

#[cfg(not(unix))]
impl Hangup {
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}
