//! Process shutdown.
//!
//! On the first termination signal the coordinator runs a single release
//! pass over every extension resource and live device. It counts expected
//! against completed releases and gives up after a fixed timeout. Later
//! signals do not start a second pass.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hwbus_extensions::ReleaseTask;
use tokio::runtime::Runtime;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Outcome of a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub expected: usize,
    /// Releases that finished, successfully or not.
    pub completed: usize,
    pub failed: usize,
    pub timed_out: bool,
}

impl DrainReport {
    /// `0` when every release finished in time, `1` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.timed_out || self.completed < self.expected {
            1
        } else {
            0
        }
    }
}

#[derive(Debug)]
pub struct ShutdownCoordinator {
    started: AtomicBool,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            started: AtomicBool::new(false),
            timeout,
        }
    }

    /// Claim the drain. Only the first call returns `true`.
    pub fn begin(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every release concurrently until all finish or the timeout
    /// elapses. Releases still running at the deadline are abandoned.
    pub async fn drain(&self, tasks: Vec<ReleaseTask>) -> DrainReport {
        let mut report = DrainReport {
            expected: tasks.len(),
            completed: 0,
            failed: 0,
            timed_out: false,
        };
        info!(expected = report.expected, timeout_ms = self.timeout.as_millis() as u64, "Releasing registered handlers");

        let mut running = JoinSet::new();
        for ReleaseTask { label, future } in tasks {
            running.spawn(async move { (label, future.await) });
        }

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                joined = running.join_next() => match joined {
                    None => break,
                    Some(Ok((label, Ok(())))) => {
                        report.completed += 1;
                        debug!(handler = %label, "Released");
                    }
                    Some(Ok((label, Err(e)))) => {
                        report.completed += 1;
                        report.failed += 1;
                        warn!(handler = %label, error = %e, "Release failed");
                    }
                    Some(Err(e)) => {
                        report.completed += 1;
                        report.failed += 1;
                        error!(error = %e, "Release task panicked");
                    }
                },
                () = &mut deadline => {
                    report.timed_out = true;
                    running.abort_all();
                    break;
                }
            }
        }

        if report.timed_out {
            error!(
                expected = report.expected,
                completed = report.completed,
                "Failed to release all handlers in time"
            );
        } else {
            info!(completed = report.completed, failed = report.failed, "Released all handlers");
        }
        report
    }
}

/// Source of termination requests.
#[allow(async_fn_in_trait)]
pub trait SignalSource {
    /// Wait for the next request and return its name.
    async fn recv(&mut self) -> &'static str;
}

/// Termination signals: SIGINT, SIGTERM, SIGUSR1 and SIGUSR2.
#[cfg(unix)]
pub struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    user1: tokio::signal::unix::Signal,
    user2: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    /// Install the handlers.
    ///
    /// # Errors
    /// When the OS refuses a handler.
    pub fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            user1: signal(SignalKind::user_defined1())?,
            user2: signal(SignalKind::user_defined2())?,
        })
    }
}

#[cfg(unix)]
impl SignalSource for Signals {
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.user1.recv() => "SIGUSR1",
            _ = self.user2.recv() => "SIGUSR2",
        }
    }
}

#[cfg(not(unix))]
pub struct Signals;

#[cfg(not(unix))]
impl Signals {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self)
    }
}

#[cfg(not(unix))]
impl SignalSource for Signals {
    async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "Ctrl+C",
            Err(_) => std::future::pending().await,
        }
    }
}

/// Run `future` on `runtime`, then drop the runtime without joining its
/// blocking pool.
///
/// A release abandoned by a timed-out drain may still sit in a blocking bus
/// call; a plain runtime drop would wait for it and hold the process open.
pub fn block_on_detached<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    output
}
