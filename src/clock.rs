// src/clock.rs - Kill-safe millisecond time source
//
// Normal timekeeping is interrupt-driven and stops when the machine is killed.
// After kill the clock switches to polling a free-running hardware counter and
// tracking its overflows itself, so `now_ms` stays usable from the kill screen.

/// Hardware timer primitives the clock is built on.
///
/// `millis` is the ordinary interrupt-driven tick and is only valid while the
/// machine is alive. The free-running counter counts down from `reload` to zero
/// and wraps; reading the overflow flag clears it.
pub trait HardwareTimer {
    /// Interrupt-driven millisecond tick. Invalid once the machine is killed.
    fn millis(&self) -> u64;
    /// Reload value of the free-running downcounter (full range after reinit).
    fn reload(&self) -> u32;
    /// Current downcounter value, in `[0, reload]`.
    fn value(&self) -> u32;
    /// True if the counter wrapped since the last read. Reading clears the flag.
    fn check_overflow(&mut self) -> bool;
    /// Downcounter ticks per millisecond.
    fn ticks_per_ms(&self) -> u64;
    /// Reconfigure the counter to its full range with interrupts disabled.
    fn reinit_full_range(&mut self);
}

impl HardwareTimer for Box<dyn HardwareTimer> {
    fn millis(&self) -> u64 {
        (**self).millis()
    }
    fn reload(&self) -> u32 {
        (**self).reload()
    }
    fn value(&self) -> u32 {
        (**self).value()
    }
    fn check_overflow(&mut self) -> bool {
        (**self).check_overflow()
    }
    fn ticks_per_ms(&self) -> u64 {
        (**self).ticks_per_ms()
    }
    fn reinit_full_range(&mut self) {
        (**self).reinit_full_range()
    }
}

/// Monotonic millisecond clock that survives a kill.
pub struct SafeClock<T: HardwareTimer> {
    timer: T,
    killed: bool,
    resynced: bool,
    /// Overflow count of the free-running counter, maintained after kill.
    time_hi: u64,
    /// Last millisecond value observed while the normal tick was still valid.
    last_good_ms: u64,
    /// Last value returned, to enforce monotonicity across the switchover.
    last_returned_ms: u64,
}

impl<T: HardwareTimer> SafeClock<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            killed: false,
            resynced: false,
            time_hi: 0,
            last_good_ms: 0,
            last_returned_ms: 0,
        }
    }

    /// Overflow period of the free-running counter in milliseconds.
    ///
    /// After a kill, `now_ms` must be called at least once per period or an
    /// overflow is missed and the clock falls behind. This is a liveness
    /// precondition on the caller, not enforced here.
    pub fn overflow_period_ms(&self) -> u64 {
        (self.timer.reload() as u64 + 1) / self.timer.ticks_per_ms()
    }

    /// Switch to the kill-safe code path. One-way.
    pub fn kill(&mut self) {
        self.killed = true;
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    /// Current time in milliseconds, monotonically non-decreasing.
    pub fn now_ms(&mut self) -> u64 {
        if !self.killed {
            let ms = self.timer.millis();
            self.last_good_ms = ms;
            self.last_returned_ms = self.last_returned_ms.max(ms);
            return self.last_returned_ms;
        }

        // First call after kill: seed the overflow counter from the last known
        // good time and restart the counter over its full range.
        if !self.resynced {
            let range = self.timer.reload() as u64 + 1;
            self.time_hi = (self.last_good_ms * self.timer.ticks_per_ms()) / range;
            self.timer.reinit_full_range();
            self.resynced = true;
            tracing::debug!(
                "Safe clock resynced at {} ms (overflow period {} ms)",
                self.last_good_ms,
                self.overflow_period_ms()
            );
        }

        if self.timer.check_overflow() {
            self.time_hi += 1;
        }

        let range = self.timer.reload() as u64 + 1;
        let lo = (self.timer.reload() - self.timer.value()) as u64;
        let ms = (self.time_hi * range + lo) / self.timer.ticks_per_ms();
        self.last_returned_ms = self.last_returned_ms.max(ms);
        self.last_returned_ms
    }

    /// Delay for `ms` milliseconds.
    ///
    /// While alive, waits cooperatively and invokes `yield_idle` each cycle so
    /// thermal management keeps running. Once killed, busy-waits on this clock
    /// and never yields to the scheduler.
    pub fn delay_ms(&mut self, ms: u64, mut yield_idle: impl FnMut()) {
        let deadline = self.now_ms() + ms;
        if self.killed {
            while self.now_ms() < deadline {
                std::hint::spin_loop();
            }
        } else {
            while self.now_ms() < deadline {
                yield_idle();
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        }
    }
}

/// Host-side timer backed by `std::time::Instant`, emulating a 24-bit
/// downcounter at 1000 ticks/ms.
pub struct SystemTimer {
    epoch: std::time::Instant,
    reload: u32,
    last_wrap_count: u64,
}

impl SystemTimer {
    const TICKS_PER_MS: u64 = 1000;

    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
            reload: 0x00FF_FFFF,
            last_wrap_count: 0,
        }
    }

    fn ticks(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64 * Self::TICKS_PER_MS
    }
}

impl Default for SystemTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareTimer for SystemTimer {
    fn millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn reload(&self) -> u32 {
        self.reload
    }

    fn value(&self) -> u32 {
        let range = self.reload as u64 + 1;
        self.reload - (self.ticks() % range) as u32
    }

    fn check_overflow(&mut self) -> bool {
        let range = self.reload as u64 + 1;
        let wraps = self.ticks() / range;
        let wrapped = wraps > self.last_wrap_count;
        self.last_wrap_count = wraps;
        wrapped
    }

    fn ticks_per_ms(&self) -> u64 {
        Self::TICKS_PER_MS
    }

    fn reinit_full_range(&mut self) {
        self.epoch = std::time::Instant::now();
        self.last_wrap_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic timer advanced by hand.
    struct FakeTimer {
        now_ticks: u64,
        reload: u32,
        overflow_pending: bool,
        millis_frozen: Option<u64>,
    }

    impl FakeTimer {
        fn new() -> Self {
            Self {
                now_ticks: 0,
                reload: 999, // 1 ms overflow period at 1000 ticks/ms
                overflow_pending: false,
                millis_frozen: None,
            }
        }

        fn advance_ticks(&mut self, ticks: u64) {
            let range = self.reload as u64 + 1;
            let before = self.now_ticks / range;
            self.now_ticks += ticks;
            if self.now_ticks / range > before {
                self.overflow_pending = true;
            }
        }
    }

    impl HardwareTimer for FakeTimer {
        fn millis(&self) -> u64 {
            self.millis_frozen.unwrap_or(self.now_ticks / 1000)
        }
        fn reload(&self) -> u32 {
            self.reload
        }
        fn value(&self) -> u32 {
            let range = self.reload as u64 + 1;
            self.reload - (self.now_ticks % range) as u32
        }
        fn check_overflow(&mut self) -> bool {
            std::mem::take(&mut self.overflow_pending)
        }
        fn ticks_per_ms(&self) -> u64 {
            1000
        }
        fn reinit_full_range(&mut self) {
            self.now_ticks = 0;
            self.overflow_pending = false;
        }
    }

    #[test]
    fn test_normal_path_uses_millis() {
        let mut timer = FakeTimer::new();
        timer.advance_ticks(5000);
        let mut clock = SafeClock::new(timer);
        assert_eq!(clock.now_ms(), 5);
    }

    #[test]
    fn test_monotonic_while_alive() {
        let mut clock = SafeClock::new(FakeTimer::new());
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }

    #[test]
    fn test_resync_preserves_time_across_kill() {
        let mut timer = FakeTimer::new();
        timer.advance_ticks(42_000); // 42 ms of good time
        let mut clock = SafeClock::new(timer);
        assert_eq!(clock.now_ms(), 42);

        clock.kill();
        // The interrupt tick is dead now; the safe path must not go backwards.
        let after = clock.now_ms();
        assert!(after >= 42);
    }

    #[test]
    fn test_overflow_advances_high_counter() {
        let mut clock = SafeClock::new(FakeTimer::new());
        clock.now_ms();
        clock.kill();
        clock.now_ms(); // resync

        // Walk the counter through three full wraps, polling each period.
        let mut last = 0;
        for _ in 0..3 {
            clock.timer.advance_ticks(1000);
            let now = clock.now_ms();
            assert!(now > last);
            last = now;
        }
        assert_eq!(last, 3);
    }

    #[test]
    fn test_killed_delay_busy_waits_without_yield() {
        let mut timer = FakeTimer::new();
        timer.millis_frozen = Some(10); // normal tick stopped
        let mut clock = SafeClock::new(timer);
        clock.now_ms();
        clock.kill();

        // Busy-wait path must never call yield_idle. The fake timer does not
        // advance on its own, so spin it from a helper thread via real time
        // being unnecessary: advance under the hood by polling.
        let mut yields = 0;
        let start = clock.now_ms();
        // Pre-advance so the deadline is already met; delay returns immediately.
        clock.timer.advance_ticks(50_000);
        clock.now_ms();
        clock.delay_ms(0, || yields += 1);
        assert_eq!(yields, 0);
        assert!(clock.now_ms() >= start);
    }

    #[test]
    fn test_overflow_period_documented() {
        let clock = SafeClock::new(FakeTimer::new());
        assert_eq!(clock.overflow_period_ms(), 1);
    }
}
