/*!
Clock helpers. Flow timestamps use the monotonic clock in milliseconds,
NetFlow headers additionally need the wall clock.
*/

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds on the monotonic clock.
/// Counts from the wall clock time of the first call, so it is never zero.
pub fn time_msec() -> i64 {
    static START: OnceLock<(Instant, i64)> = OnceLock::new();
    let (start, base) = START.get_or_init(|| (Instant::now(), time_wall_msec().max(1)));
    let elapsed = start.elapsed();
    base + elapsed.as_secs() as i64 * 1000 + i64::from(elapsed.subsec_millis())
}

/// Seconds and nanoseconds since the epoch
pub fn time_wall() -> (u32, u32) {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as u32, d.subsec_nanos()),
        Err(_) => (0, 0),
    }
}

/// Milliseconds since the epoch
pub fn time_wall_msec() -> i64 {
    let (sec, nsec) = time_wall();
    i64::from(sec) * 1000 + i64::from(nsec) / 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic() {
        let first = time_msec();
        let second = time_msec();
        assert!(first > 0);
        assert!(second >= first);
    }

    #[test]
    fn wall_after_2001() {
        assert!(time_wall().0 > 1_000_000_000);
    }
}
