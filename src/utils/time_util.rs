use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// a point in time as seconds and fraction of a second in nanoseconds since [UNIX_EPOCH]
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    /// seconds
    pub sec: u64,
    /// fraction of a second in nanoseconds
    pub nsec: u32,
}

/// calculate what time is it since `1970-1-1 00:00:00`,named as [UNIX_EPOCH]
pub fn now() -> Timestamp {
    // a clock set before the epoch is reported as the epoch itself
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Timestamp {
        sec: now.as_secs(),
        nsec: now.subsec_nanos(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_after_epoch() {
        assert!(now() > Timestamp::default());
    }

    #[test]
    fn test_timestamps_order_by_seconds_then_nanoseconds() {
        let earlier = Timestamp { sec: 5, nsec: 900 };
        assert!(earlier < Timestamp { sec: 6, nsec: 0 });
        assert!(earlier < Timestamp { sec: 5, nsec: 901 });
    }
}
