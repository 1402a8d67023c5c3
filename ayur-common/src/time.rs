//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as whole seconds since the Unix epoch
pub fn epoch_seconds() -> i64 {
    now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_epoch_seconds_matches_now() {
        let before = now().timestamp();
        let secs = epoch_seconds();
        let after = now().timestamp();
        assert!(secs >= before && secs <= after);
    }

    #[test]
    fn test_epoch_seconds_before_2100() {
        assert!(epoch_seconds() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }
}
