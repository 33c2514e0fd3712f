//! Shared runtime substrate: the shutdown flag and refined-sleep loops.
//!
//! Long sleeps are split into short quanta so that host suspension does not
//! skew deadlines and SIGTERM response stays bounded by one quantum.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

/// Cooperative shutdown flag shared by a service's main loop and its
/// signal handlers.
#[derive(Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Latches SIGINT and SIGTERM onto the shutdown flag.
pub fn install_signal_handlers(shutdown: &Shutdown) -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    signal_hook::flag::register(SIGTERM, shutdown.flag())?;
    signal_hook::flag::register(SIGINT, shutdown.flag())?;
    info!("Signal handlers installed");
    Ok(())
}

/// Default sleep quantum for the synchronizer and downloader loops.
pub const DEFAULT_QUANTUM: Duration = Duration::from_secs(1);

/// Sleeps for `interval`, waking every second to check the shutdown flag.
/// Returns early when shutdown is requested.
pub fn sleep_until_next_check(shutdown: &Shutdown, interval: Duration) {
    sleep_with_quantum(shutdown, interval, DEFAULT_QUANTUM);
}

/// Sleeps for `total`, in slices of at most `quantum`, checking the shutdown
/// flag between slices. Never oversleeps by more than one quantum.
pub fn sleep_with_quantum(shutdown: &Shutdown, total: Duration, quantum: Duration) {
    let quantum = quantum.max(Duration::from_millis(10));
    let deadline = Instant::now() + total;
    while !shutdown.is_requested() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(quantum));
    }
}

/// Sleeps until the wall-clock instant `deadline`, in slices of at most
/// `quantum`. The remaining wait is recomputed from the wall clock after
/// every slice, so a host suspension cannot push a calendar deadline late
/// by more than one quantum.
pub fn sleep_until_wall(
    shutdown: &Shutdown,
    deadline: chrono::DateTime<chrono::Utc>,
    quantum: Duration,
) {
    let quantum = quantum.max(Duration::from_millis(10));
    while !shutdown.is_requested() {
        let remaining = match (deadline - chrono::Utc::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => break,
        };
        std::thread::sleep(remaining.min(quantum));
    }
}
