//! FILETIME conversion.

use time::OffsetDateTime;

/// Milliseconds between 1601-01-01T00:00:00Z and the Unix epoch.
const EPOCH_DELTA_MILLIS: i64 = 11_644_473_600_000;

/// Convert a Windows FILETIME (100-nanosecond intervals since
/// 1601-01-01 UTC) to an [`OffsetDateTime`], at millisecond precision.
pub fn filetime_to_datetime(filetime: u64) -> OffsetDateTime {
    let millis = (filetime / 10_000) as i64 - EPOCH_DELTA_MILLIS;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

pub fn filetime_from_parts(high: u32, low: u32) -> u64 {
    (u64::from(high) << 32) | u64::from(low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_filetime_epoch_delta() {
        // 1970-01-01T00:00:00Z expressed as a FILETIME
        let filetime = EPOCH_DELTA_MILLIS as u64 * 10_000;
        assert_eq!(filetime_to_datetime(filetime), OffsetDateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_filetime_to_datetime() {
        let filetime = filetime_from_parts(0x01D3_B4C0, 0x5404_6110);
        assert_eq!(
            filetime_to_datetime(filetime),
            datetime!(2018-03-05 20:27:06.017 UTC)
        );
    }

    #[test]
    fn test_filetime_millisecond_truncation() {
        // 6,170 ticks is 617 microseconds; anything below a full millisecond
        // is dropped
        let filetime = filetime_from_parts(0x01D3_B4C0, 0x5404_6110) + 6_170;
        assert_eq!(
            filetime_to_datetime(filetime),
            datetime!(2018-03-05 20:27:06.017 UTC)
        );
    }

    #[test]
    fn test_filetime_before_unix_epoch() {
        let filetime = (EPOCH_DELTA_MILLIS as u64 - 1_000) * 10_000;
        assert_eq!(
            filetime_to_datetime(filetime),
            datetime!(1969-12-31 23:59:59 UTC)
        );
    }
}
