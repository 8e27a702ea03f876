//! Capture date used for date folders

use chrono::{DateTime, NaiveDate, Utc};
use shared::models::ImageRecord;

/// EXIF keys consulted, in order
const EXIF_DATE_KEYS: [&str; 2] = ["DateTimeOriginal", "DateTime"];

/// Best capture date of a record: `DateTimeOriginal`, then `DateTime`,
/// then `inserted_at`, then `now`.
pub fn capture_date(record: &ImageRecord, now: DateTime<Utc>) -> NaiveDate {
    EXIF_DATE_KEYS
        .iter()
        .filter_map(|key| record.exif.get(*key))
        .find_map(|value| parse_exif_date(value))
        .or_else(|| {
            DateTime::<Utc>::from_timestamp_millis(record.inserted_at)
                .filter(|_| record.inserted_at > 0)
                .map(|dt| dt.date_naive())
        })
        .unwrap_or_else(|| now.date_naive())
}

/// Accepts `YYYY:MM:DD[ HH:MM:SS]` and `YYYY-MM-DD[...]`
fn parse_exif_date(value: &str) -> Option<NaiveDate> {
    let date = value.trim().get(..10)?;
    let normalized: String = date.chars().map(|c| if c == ':' { '-' } else { c }).collect();
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok()
}

/// `YYYY/MM/DD`
pub fn date_path(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(inserted_at: i64) -> ImageRecord {
        ImageRecord::new_ingested("img", "new/a.jpg", "new/a_s.jpg", "new/a_l.jpg", inserted_at)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_exif_original_wins() {
        let mut r = record(0);
        r.exif.insert("DateTimeOriginal".into(), "2024:03:02 10:11:12".into());
        r.exif.insert("DateTime".into(), "2023:01:01 00:00:00".into());
        assert_eq!(date_path(capture_date(&r, now())), "2024/03/02");
    }

    #[test]
    fn test_falls_through_unparseable_exif() {
        let mut r = record(0);
        r.exif.insert("DateTimeOriginal".into(), "0000:00:00 00:00:00".into());
        r.exif.insert("DateTime".into(), "2023-07-15T08:00:00".into());
        assert_eq!(date_path(capture_date(&r, now())), "2023/07/15");
    }

    #[test]
    fn test_inserted_at_then_now() {
        let inserted = Utc
            .with_ymd_and_hms(2024, 3, 2, 10, 0, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(date_path(capture_date(&record(inserted), now())), "2024/03/02");
        assert_eq!(date_path(capture_date(&record(0), now())), "2030/01/01");
    }
}
