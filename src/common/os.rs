use core::sync::atomic::{AtomicBool, Ordering};

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "std"))] {
        /// Give other contexts a chance to run while busy-waiting.
        #[inline]
        pub fn yield_cpu() {
            std::thread::yield_now();
        }

        pub use waiter_trait::{StdInterval, StdWaiter};
    } else {
        /// Give other contexts a chance to run while busy-waiting.
        #[inline]
        pub fn yield_cpu() {
            core::hint::spin_loop();
        }
    }
}

pub use waiter_trait::{Counter, Interval, NonInterval, Waiter, WaiterStatus};

/// A [`Counter`] that never expires. Waiting on it blocks until the condition
/// becomes true.
#[inline]
pub fn forever() -> Counter {
    Counter::new(usize::MAX)
}

/// A flag another context (an interrupt, a thread) raises to abort a wait.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl WaiterStatus for &CancelToken {
    #[inline]
    fn timeout(&mut self) -> bool {
        self.is_cancelled()
    }

    #[inline]
    fn restart(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn counter_expires_after_retries() {
        let c = Counter::new(3);
        let mut t = c.start();
        assert!(!t.timeout());
        assert!(!t.timeout());
        assert!(!t.timeout());
        assert!(t.timeout());
        assert!(t.timeout());
        t.restart();
        assert!(!t.timeout());

        let c = Counter::new(0);
        assert!(c.start().timeout());
    }

    #[test]
    fn forever_never_expires() {
        let w = forever();
        let mut t = w.start();
        for _ in 0..1000 {
            assert!(!t.timeout());
        }
    }

    #[test]
    fn cancel_token() {
        let token = CancelToken::new();
        let mut t = &token;
        assert!(!t.timeout());
        token.cancel();
        assert!(t.timeout());
        t.restart();
        assert!(!token.is_cancelled());
        assert!(!t.timeout());
    }

    #[test]
    fn std_waiter() {
        let w = StdWaiter::new(Duration::from_millis(20), StdInterval::new(Duration::ZERO));
        let mut t = w.start();
        assert!(!t.timeout());
        std::thread::sleep(Duration::from_millis(30));
        assert!(t.timeout());
    }
}
