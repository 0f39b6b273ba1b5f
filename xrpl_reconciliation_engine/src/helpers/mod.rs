mod tag_filter;

use chrono::{DateTime, Utc};

pub use tag_filter::has_target_tag;

/// Seconds between the unix epoch and the ripple epoch (2000-01-01T00:00:00Z). Ledger close times
/// are reported relative to the latter.
pub const RIPPLE_EPOCH_OFFSET: i64 = 946_684_800;

/// Converts a ripple-epoch timestamp to UTC. Returns `None` for values outside the representable
/// range.
pub fn ripple_time_to_utc(ripple_secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ripple_secs.checked_add(RIPPLE_EPOCH_OFFSET)?, 0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ripple_epoch_is_y2k() {
        let ts = ripple_time_to_utc(0).unwrap();
        assert_eq!(ts.to_rfc3339(), "2000-01-01T00:00:00+00:00");
    }

    #[test]
    fn ripple_time_converts_forward() {
        let ts = ripple_time_to_utc(772_000_000).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-06-18T04:26:40+00:00");
    }

    #[test]
    fn out_of_range_time_is_none() {
        assert!(ripple_time_to_utc(i64::MAX).is_none());
    }
}
