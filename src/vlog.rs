/*!
Token bucket rate limiting for log messages that can repeat quickly,
such as failed collector sends or replies that belong to nobody.

Every component owns its own `RateLimit`, so two instances never
throttle each other.
*/

use crate::time::time_msec;

/// The bucket refills `rate` tokens per minute and holds up to `burst`.
#[derive(Debug, Clone)]
pub struct RateLimit {
    rate: u32,
    burst: u32,
    tokens: u64,
    last_fill: i64,
    first_dropped: i64,
    n_dropped: u32,
}

/// Tokens spent per message. A token is one millisecond of a minute.
const MSG_TOKENS: u64 = 60 * 1000;

impl RateLimit {
    pub fn new(rate: u32, burst: u32) -> RateLimit {
        let rate = rate.max(1);
        RateLimit {
            rate,
            burst: burst.max(1),
            tokens: 0,
            last_fill: i64::min_value(),
            first_dropped: 0,
            n_dropped: 0,
        }
    }

    /// Returns whether a message may be logged right now
    pub fn allow(&mut self) -> bool {
        self.allow_at(time_msec())
    }

    /// Like `allow` but at the given monotonic time in milliseconds
    pub fn allow_at(&mut self, now: i64) -> bool {
        let max_tokens = u64::from(self.burst) * MSG_TOKENS;
        if self.last_fill == i64::min_value() {
            self.tokens = max_tokens;
        }
        else if now > self.last_fill {
            let elapsed = (now - self.last_fill) as u64;
            let add = elapsed.saturating_mul(u64::from(self.rate));
            self.tokens = self.tokens.saturating_add(add).min(max_tokens);
        }
        self.last_fill = now;

        if self.tokens < MSG_TOKENS {
            if self.n_dropped == 0 {
                self.first_dropped = now;
            }
            self.n_dropped += 1;
            return false;
        }
        self.tokens -= MSG_TOKENS;

        if self.n_dropped > 0 {
            info!(
                "Dropped {} log messages in last {} seconds due to excessive rate",
                self.n_dropped,
                (now - self.first_dropped) / 1000
            );
            self.n_dropped = 0;
        }
        true
    }

    pub fn dropped(&self) -> u32 {
        self.n_dropped
    }
}

/// Logs at debug level unless the rate limit says otherwise.
#[macro_export]
macro_rules! debug_rl {
    ($rl:expr, $($arg:tt)+) => {
        if $rl.allow() {
            debug!($($arg)+);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_drop() {
        let mut testee = RateLimit::new(1, 5);
        for _ in 0..5 {
            assert!(testee.allow_at(1000));
        }
        assert!(!testee.allow_at(1000));
        assert!(!testee.allow_at(2000));
        assert_eq!(2, testee.dropped());
    }

    #[test]
    fn refills_per_minute() {
        let mut testee = RateLimit::new(1, 5);
        for _ in 0..5 {
            testee.allow_at(0);
        }
        assert!(!testee.allow_at(59_999));
        assert!(testee.allow_at(60_000));
        assert_eq!(0, testee.dropped());
        assert!(!testee.allow_at(60_001));
    }

    #[test]
    fn instances_are_independent() {
        let mut first = RateLimit::new(1, 1);
        let mut second = RateLimit::new(1, 1);
        assert!(first.allow_at(0));
        assert!(!first.allow_at(0));
        assert!(second.allow_at(0));
    }
}
