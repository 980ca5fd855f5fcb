use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Caller-owned stop signal shared between the extractor and the batch writer.
///
/// Clones observe the same flag. An optional deadline turns the flag into a
/// timeout: once it passes, `is_cancelled` reports `true` without anyone
/// calling `cancel`.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }

        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationFlag;
    use std::time::Duration;

    #[test]
    fn clones_share_the_flag() {
        let flag = CancellationFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());

        flag.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn elapsed_deadline_counts_as_cancelled() {
        let flag = CancellationFlag::with_timeout(Duration::ZERO);
        assert!(flag.is_cancelled());

        let generous = CancellationFlag::with_timeout(Duration::from_secs(3_600));
        assert!(!generous.is_cancelled());
    }
}
