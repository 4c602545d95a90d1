use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

/// The date a run syncs. Explicit `YYYY-MM-DD` wins; otherwise the current UTC date,
/// which is also the id of the day's document in the store.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid as-of date {s:?} (expected YYYY-MM-DD)"));
    }
    Ok(now_utc.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn defaults_to_utc_date() {
        // 23:30 UTC is already the next day in most of Asia; the UTC date is used.
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 23, 30, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
    }

    #[test]
    fn explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 12, 0, 0).unwrap();
        let d = resolve_as_of_date(Some("2025-12-31"), now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert!(resolve_as_of_date(Some("31/12/2025"), now).is_err());
    }
}
