//! Global atomic counters.
//!
//! Incremented silently at the call site; [`Metrics::flush`] emits the
//! current values as one `tracing::info!` event (e.g. when a session ends).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lock-free counters.
pub struct Metrics {
    commands_executed: AtomicU64,
    commands_simulated: AtomicU64,
    bootstraps: AtomicU64,
    stages_passed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            commands_executed: AtomicU64::new(0),
            commands_simulated: AtomicU64::new(0),
            bootstraps: AtomicU64::new(0),
            stages_passed: AtomicU64::new(0),
        }
    }

    /// A command reached the repository engine.
    pub fn inc_commands_executed(&self) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "commands_executed", "counter incremented");
    }

    /// An advanced verb was recorded instead of run.
    pub fn inc_commands_simulated(&self) {
        self.commands_simulated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "commands_simulated", "counter incremented");
    }

    /// A stage repository was seeded.
    pub fn inc_bootstraps(&self) {
        self.bootstraps.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "bootstraps", "counter incremented");
    }

    pub fn inc_stages_passed(&self) {
        self.stages_passed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stages_passed", "counter incremented");
    }

    /// Emit all counters as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            commands_executed = self.commands_executed(),
            commands_simulated = self.commands_simulated(),
            bootstraps = self.bootstraps(),
            stages_passed = self.stages_passed(),
        );
    }

    pub fn commands_executed(&self) -> u64 {
        self.commands_executed.load(Ordering::Relaxed)
    }

    pub fn commands_simulated(&self) -> u64 {
        self.commands_simulated.load(Ordering::Relaxed)
    }

    pub fn bootstraps(&self) -> u64 {
        self.bootstraps.load(Ordering::Relaxed)
    }

    pub fn stages_passed(&self) -> u64 {
        self.stages_passed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.commands_executed.store(0, Ordering::Relaxed);
        self.commands_simulated.store(0, Ordering::Relaxed);
        self.bootstraps.store(0, Ordering::Relaxed);
        self.stages_passed.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_commands_executed();
        m.inc_commands_executed();
        m.inc_commands_simulated();
        m.inc_bootstraps();
        m.inc_stages_passed();
        m.inc_stages_passed();
        m.inc_stages_passed();
        assert_eq!(m.commands_executed(), 2);
        assert_eq!(m.commands_simulated(), 1);
        assert_eq!(m.bootstraps(), 1);
        assert_eq!(m.stages_passed(), 3);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_commands_executed();
        m.inc_bootstraps();
        m.reset();
        assert_eq!(m.commands_executed(), 0);
        assert_eq!(m.bootstraps(), 0);
    }
}
