use lazy_static::lazy_static;
use std::time::Instant;
use time::{macros::format_description, Duration, OffsetDateTime};

lazy_static! {
    static ref UNIX_TIME_UNIT_OFFSET: i128 = (Duration::MILLISECOND / Duration::NANOSECOND) as i128;
    /// The wall clock is read once, later timestamps advance with the monotonic clock,
    /// so they look like unix timestamps but never go backwards.
    static ref CLOCK_ANCHOR: (Instant, i128) =
        (Instant::now(), OffsetDateTime::now_utc().unix_timestamp_nanos());
}

#[inline]
pub fn unix_time_unit_offset() -> u64 {
    *UNIX_TIME_UNIT_OFFSET as u64
}

#[inline]
pub fn sleep_for_ms(ms: u64) {
    std::thread::sleep(std::time::Duration::from_millis(ms));
}

#[inline]
pub fn sleep_for_ns(ns: u64) {
    std::thread::sleep(std::time::Duration::from_nanos(ns));
}

#[inline]
fn cal_curr_time_nanos() -> i128 {
    let (anchor, wall) = *CLOCK_ANCHOR;
    wall + anchor.elapsed().as_nanos() as i128
}

#[inline]
fn cal_curr_time_millis() -> u64 {
    (cal_curr_time_nanos() / (*UNIX_TIME_UNIT_OFFSET)) as u64
}

/// Formats the timestamp as `[hour]:[minute]:[second]`.
/// An unrepresentable timestamp is rendered as its raw millisecond value.
pub fn format_time_millis(ts_millis: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(milli2nano(ts_millis))
        .ok()
        .and_then(|t| {
            t.format(format_description!("[hour]:[minute]:[second]"))
                .ok()
        })
        .unwrap_or_else(|| ts_millis.to_string())
}

pub fn curr_time_millis() -> u64 {
    let ticker_time = curr_time_millis_with_ticker();
    if ticker_time > 0 {
        ticker_time
    } else {
        cal_curr_time_millis()
    }
}

#[inline]
pub fn curr_time_nanos() -> i128 {
    cal_curr_time_nanos()
}

#[inline]
pub fn milli2nano<T: Into<i128>>(t: T) -> i128 {
    *UNIX_TIME_UNIT_OFFSET * t.into()
}

pub use ticker::*;

// provide cached time by a ticker
pub mod ticker {
    use super::*;
    use lazy_static::lazy_static;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    lazy_static! {
        static ref NOW_IN_MS: AtomicU64 = AtomicU64::new(0);
        static ref TICKER_STARTED: AtomicBool = AtomicBool::new(false);
    }

    /// `start_time_ticker()` starts a background thread that caches current timestamp per millisecond,
    /// which may provide better performance in high-concurrency scenarios.
    /// Only the first call spawns the thread.
    pub fn start_time_ticker() {
        if TICKER_STARTED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        update_time();
        std::thread::spawn(move || loop {
            update_time();
            std::thread::sleep(std::time::Duration::from_millis(1));
        });
    }

    #[inline]
    fn update_time() {
        let curr = cal_curr_time_millis();
        NOW_IN_MS.store(curr, Ordering::SeqCst);
    }

    #[inline]
    pub(super) fn curr_time_millis_with_ticker() -> u64 {
        NOW_IN_MS.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn monotonic() {
        let mut last = curr_time_nanos();
        for _ in 0..1000 {
            let now = curr_time_nanos();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn millis_advance() {
        let start = curr_time_millis();
        sleep_for_ms(20);
        let end = curr_time_millis();
        assert!(end >= start + 20);
    }

    #[test]
    fn format() {
        assert_eq!(format_time_millis(0), "00:00:00");
        assert_eq!(milli2nano(3u32), 3_000_000);
    }
}
