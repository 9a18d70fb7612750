use std::sync::atomic::{AtomicBool, Ordering};

/// Single-flight flag for a background pass.
/// Only deduplicates invocations, storage transactions keep the data consistent.
#[derive(Debug, Default)]
pub struct RunGuard {
    running: AtomicBool,
}

/// Clears the flag when dropped, including on error paths
#[derive(Debug)]
pub struct RunToken<'a> {
    running: &'a AtomicBool,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if a pass already holds the guard
    pub fn try_acquire(&self) -> Option<RunToken<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunToken {
                running: &self.running,
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunToken<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
