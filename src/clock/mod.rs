//! Coarse cached clock
//!
//! [`time`] reads a timestamp refreshed by a background thread every 250 ms,
//! which is much cheaper than querying the system clock on hot paths. Ticks are
//! aligned to 250 ms wall-clock boundaries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Local, Timelike};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use tracing::warn;

/// Resolution of [`time`]
pub const RATE: Duration = Duration::from_millis(250);

lazy_static! {
    static ref CLOCK: Clock = Clock::start();
}

static SLEEP_OVERRIDE: AtomicU64 = AtomicU64::new(0);
const SLEEP_SKIP: u64 = u64::MAX;

struct ClockState {
    now: ArcSwap<DateTime<Local>>,
    /// Set while a mocked time is in effect; guards every store
    frozen: Mutex<bool>,
    ticking: AtomicBool,
}

struct Clock {
    state: Arc<ClockState>,
}

impl Clock {
    fn start() -> Self {
        let state = Arc::new(ClockState {
            now: ArcSwap::from_pointee(Local::now()),
            frozen: Mutex::new(false),
            ticking: AtomicBool::new(false),
        });

        let ticker = Arc::clone(&state);
        let spawned = std::thread::Builder::new()
            .name("fast-clock".to_string())
            .spawn(move || loop {
                std::thread::sleep(next_tick_delay(Local::now()));
                ticker.tick(Local::now());
            });
        match spawned {
            Ok(_) => state.ticking.store(true, Ordering::Release),
            Err(err) => warn!(
                error = %err,
                "Failed to start clock thread, falling back to system time"
            ),
        }

        Self { state }
    }
}

impl ClockState {
    fn tick(&self, t: DateTime<Local>) {
        let frozen = self.frozen.lock();
        if !*frozen {
            self.now.store(Arc::new(t));
        }
    }
}

/// Delay from `t` until the next 250 ms boundary, skipping a boundary that is
/// less than a quarter period away.
fn next_tick_delay(t: DateTime<Local>) -> Duration {
    let rate_nanos = RATE.as_nanos() as u64;
    let into_period = u64::from(t.nanosecond() % 1_000_000_000) % rate_nanos;
    let mut delay = rate_nanos - into_period;
    if delay < rate_nanos / 4 {
        delay += rate_nanos;
    }
    Duration::from_nanos(delay)
}

/// Current local time with a resolution of 250 ms.
pub fn time() -> DateTime<Local> {
    let state = &CLOCK.state;
    if !state.ticking.load(Ordering::Acquire) && !*state.frozen.lock() {
        return Local::now();
    }
    **state.now.load()
}

/// Override the time returned by [`time`] and return the new clock value.
/// `None` restarts the clock from the system time.
#[cfg(any(test, feature = "test-util"))]
pub fn mock_time(t: Option<DateTime<Local>>) -> DateTime<Local> {
    let state = &CLOCK.state;
    let mut frozen = state.frozen.lock();
    *frozen = t.is_some();
    let t = t.unwrap_or_else(Local::now);
    state.now.store(Arc::new(t));
    t
}

/// Replacement behavior for [`sleep`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOverride {
    /// Sleep for the requested duration
    Off,
    /// Sleep for this duration instead of the requested one
    Fixed(Duration),
    /// Return immediately
    Skip,
}

impl SleepOverride {
    #[cfg_attr(not(any(test, feature = "test-util")), allow(dead_code))]
    fn encode(self) -> u64 {
        match self {
            SleepOverride::Off => 0,
            SleepOverride::Fixed(d) => {
                // Saturate before narrowing so huge durations stay huge
                let nanos = d.as_nanos().min(u128::from(SLEEP_SKIP - 1)) as u64;
                nanos.max(1)
            }
            SleepOverride::Skip => SLEEP_SKIP,
        }
    }

    fn decode(raw: u64) -> Self {
        match raw {
            0 => SleepOverride::Off,
            SLEEP_SKIP => SleepOverride::Skip,
            nanos => SleepOverride::Fixed(Duration::from_nanos(nanos)),
        }
    }
}

/// Pause the current task for at least `d`, unless overridden by
/// `mock_sleep`.
pub async fn sleep(d: Duration) {
    match SleepOverride::decode(SLEEP_OVERRIDE.load(Ordering::Relaxed)) {
        SleepOverride::Off => tokio::time::sleep(d).await,
        SleepOverride::Fixed(fixed) => tokio::time::sleep(fixed).await,
        SleepOverride::Skip => {}
    }
}

/// Override the duration of every [`sleep`] call.
#[cfg(any(test, feature = "test-util"))]
pub fn mock_sleep(mode: SleepOverride) {
    SLEEP_OVERRIDE.store(mode.encode(), Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Instant;

    fn ms(d: chrono::Duration) -> i64 {
        d.num_milliseconds()
    }

    #[test]
    fn test_next_tick_delay() {
        let base = Local.timestamp_opt(1_000, 0).unwrap();
        assert_eq!(next_tick_delay(base), RATE);

        let mid = Local.timestamp_opt(1_000, 100_000_000).unwrap();
        assert_eq!(next_tick_delay(mid), Duration::from_millis(150));

        // 10 ms before a boundary: skip it
        let late = Local.timestamp_opt(1_000, 240_000_000).unwrap();
        assert_eq!(next_tick_delay(late), Duration::from_millis(260));
    }

    #[test]
    fn test_time() {
        mock_time(None);
        let t1 = time();
        let d = ms(Local::now() - t1);
        assert!((0..50).contains(&d), "d={}", d);

        std::thread::sleep(RATE + RATE / 2);
        let d = ms(time() - t1);
        assert!(d >= (RATE / 4).as_millis() as i64, "d={}", d);
        assert!(d <= (RATE * 2).as_millis() as i64, "d={}", d);

        for mt in [
            Local.timestamp_opt(1, 0).unwrap(),
            Local.timestamp_opt(2, 2).unwrap(),
        ] {
            assert_eq!(mock_time(Some(mt)), mt);
            assert_eq!(time(), mt);
        }

        let restarted = mock_time(None);
        assert!(ms(time() - restarted) < (RATE * 2).as_millis() as i64);
        let d = ms(Local::now() - time());
        assert!((0..50).contains(&d), "d={}", d);
    }

    #[tokio::test]
    async fn test_sleep() {
        let d = Duration::from_millis(50);

        mock_sleep(SleepOverride::Fixed(d));
        let start = Instant::now();
        sleep(Duration::ZERO).await;
        assert!(start.elapsed() >= d);

        mock_sleep(SleepOverride::Skip);
        let start = Instant::now();
        sleep(d).await;
        assert!(start.elapsed() < d / 2);

        mock_sleep(SleepOverride::Off);
        let start = Instant::now();
        sleep(d).await;
        assert!(start.elapsed() >= d);
    }

    #[test]
    fn test_override_encoding() {
        for mode in [
            SleepOverride::Off,
            SleepOverride::Skip,
            SleepOverride::Fixed(Duration::from_millis(3)),
        ] {
            assert_eq!(SleepOverride::decode(mode.encode()), mode);
        }
        assert_eq!(
            SleepOverride::decode(SleepOverride::Fixed(Duration::ZERO).encode()),
            SleepOverride::Fixed(Duration::from_nanos(1))
        );
    }

    #[test]
    fn test_override_encoding_saturates() {
        // 2^64 ns plus one would wrap to 1 ns if narrowed first
        let huge = Duration::from_nanos(u64::MAX) + Duration::from_nanos(2);
        assert_eq!(
            SleepOverride::decode(SleepOverride::Fixed(huge).encode()),
            SleepOverride::Fixed(Duration::from_nanos(u64::MAX - 1))
        );
        assert_eq!(
            SleepOverride::decode(SleepOverride::Fixed(Duration::MAX).encode()),
            SleepOverride::Fixed(Duration::from_nanos(u64::MAX - 1))
        );
    }
}
