use std::thread;
use std::time::Duration;

use crate::settings::{Backoff, FocusSettings};

/// Sleep for exact milliseconds (no jitter).
pub fn sleep_ms(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// Delay before retry number `attempt` (1-based) of a focus operation.
pub fn backoff_delay(focus: &FocusSettings, attempt: u32) -> Duration {
    let base = focus.backoff_ms;
    let ms = match focus.backoff {
        Backoff::Linear => base.saturating_mul(attempt as u64),
        Backoff::Exponential => base.saturating_mul(1u64 << attempt.saturating_sub(1).min(16)),
    };
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_backoff_grows_by_base() {
        let f = FocusSettings { attempts: 3, backoff_ms: 100, backoff: Backoff::Linear };
        assert_eq!(backoff_delay(&f, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(&f, 3), Duration::from_millis(300));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let f = FocusSettings { attempts: 4, backoff_ms: 100, backoff: Backoff::Exponential };
        assert_eq!(backoff_delay(&f, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(&f, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(&f, 4), Duration::from_millis(800));
    }
}
