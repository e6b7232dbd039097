use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a response timestamp is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampMethod {
    /// Monotonic clock with sub-millisecond resolution.
    #[default]
    Monotonic,
    /// Truncated to whole milliseconds, the resolution of a browser's
    /// `Date.now()`. The reading still comes from the monotonic clock.
    Millisecond,
}

impl TimestampMethod {
    /// Reduces a monotonic reading to this method's resolution, so onset and
    /// response stamps taken the same way stay comparable.
    pub fn resolve(self, at: Duration) -> Duration {
        match self {
            TimestampMethod::Monotonic => at,
            TimestampMethod::Millisecond => Duration::from_millis(at.as_millis() as u64),
        }
    }
}

/// Time source shared by the event loop and every trial it drives.
///
/// `now` is monotonic and measured from the timer's origin.
pub trait Timer: Clone {
    fn now(&self) -> Duration;
    fn sleep(&self, d: Duration);

    fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            self.sleep(deadline - now);
        }
    }
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    start: Instant,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        self.hybrid_sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `req` outlives the call and the remainder pointer may be null.
        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn hybrid_sleep(&self, duration: Duration) {
        // Spin through the final stretch.
        const SPIN_THRESHOLD: Duration = Duration::from_micros(100);

        let target = Instant::now() + duration;
        if duration > SPIN_THRESHOLD {
            std::thread::sleep(duration - SPIN_THRESHOLD);
        }
        while Instant::now() < target {
            std::hint::spin_loop();
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Virtual clock for simulated sessions and tests.
///
/// Clones share the same time, so a test can keep one handle and advance
/// the clock a controller is reading. `sleep` advances instead of blocking.
#[derive(Debug, Clone)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Moves the clock to `t`. Time never runs backwards; earlier targets are ignored.
    pub fn set(&self, t: Duration) {
        self.now_ns.fetch_max(t.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
