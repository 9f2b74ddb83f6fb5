//! Date-bucket labels for timeline dividers
//!
//! Pure functions that can be tested without a clock.

use chrono::{DateTime, TimeZone, Utc};

pub const TODAY: &str = "Today";
pub const YESTERDAY: &str = "Yesterday";

/// Label of the divider a message belongs under, relative to `now`.
///
/// The message is converted into `now`'s time zone first, so "Today" means
/// the viewer's calendar day.
pub fn bucket_label<Tz: TimeZone>(timestamp: &DateTime<Utc>, now: &DateTime<Tz>) -> String {
    let day = timestamp.with_timezone(&now.timezone()).date_naive();
    let today = now.date_naive();

    if day == today {
        TODAY.to_string()
    } else if today.pred_opt() == Some(day) {
        YESTERDAY.to_string()
    } else {
        day.format("%b %-d, %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_today_and_yesterday() {
        let now = utc(2024, 3, 15, 18, 0);
        assert_eq!(bucket_label(&utc(2024, 3, 15, 0, 1), &now), "Today");
        assert_eq!(bucket_label(&utc(2024, 3, 14, 23, 59), &now), "Yesterday");
        assert_eq!(bucket_label(&utc(2024, 3, 13, 12, 0), &now), "Mar 13, 2024");
    }

    #[test]
    fn test_year_boundary() {
        let now = utc(2024, 1, 1, 9, 0);
        assert_eq!(bucket_label(&utc(2023, 12, 31, 9, 0), &now), "Yesterday");
        assert_eq!(bucket_label(&utc(2023, 12, 30, 9, 0), &now), "Dec 30, 2023");
    }

    #[test]
    fn test_uses_viewer_time_zone() {
        // 23:30 UTC on the 14th is already the 15th in UTC+2
        let kyiv = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = kyiv.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        assert_eq!(bucket_label(&utc(2024, 3, 14, 23, 30), &now), "Today");

        let now_utc = utc(2024, 3, 15, 10, 0);
        assert_eq!(bucket_label(&utc(2024, 3, 14, 23, 30), &now_utc), "Yesterday");
    }

    #[test]
    fn test_future_message_gets_calendar_label() {
        let now = utc(2024, 3, 15, 10, 0);
        assert_eq!(bucket_label(&utc(2024, 3, 16, 1, 0), &now), "Mar 16, 2024");
    }
}
