use derive_more::Display;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum TimeRangeError {
    #[display(fmt = "Invalid time format '{}', expected HH:MM", _0)]
    InvalidTimeFormat(String),
    #[display(fmt = "End time must be after start time")]
    InvalidTime,
}

/// Parse a `HH:MM` clock string into minutes since midnight (0..=1439).
pub fn parse_hhmm(raw: &str) -> Result<u16, TimeRangeError> {
    let malformed = || TimeRangeError::InvalidTimeFormat(raw.to_string());

    let (hh, mm) = raw.trim().split_once(':').ok_or_else(malformed)?;

    if hh.is_empty() || hh.len() > 2 || mm.len() != 2 {
        return Err(malformed());
    }
    if !hh.bytes().all(|b| b.is_ascii_digit()) || !mm.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let hours: u16 = hh.parse().map_err(|_| malformed())?;
    let minutes: u16 = mm.parse().map_err(|_| malformed())?;

    if hours > 23 || minutes > 59 {
        return Err(malformed());
    }

    Ok(hours * 60 + minutes)
}

/// Parse a start/end pair and require a strictly positive duration.
/// Equal or reversed times are invalid: a half-day or overtime slot
/// must cover at least one minute.
pub fn validate_window(start: &str, end: &str) -> Result<(u16, u16), TimeRangeError> {
    let start_min = parse_hhmm(start)?;
    let end_min = parse_hhmm(end)?;

    if end_min <= start_min {
        return Err(TimeRangeError::InvalidTime);
    }

    Ok((start_min, end_min))
}

/// Open-interval intersection of two minute windows. Touching
/// boundaries (a ends exactly where b starts) do NOT overlap.
pub fn windows_overlap(a: (u16, u16), b: (u16, u16)) -> bool {
    a.0 < b.1 && a.1 > b.0
}

/// Duration of a minute window in hours, rounded to 2 decimal places.
/// Overtime hours are derived here so the stored value can never drift
/// from what the overlap check parsed.
pub fn window_hours(start_min: u16, end_min: u16) -> f64 {
    let hours = f64::from(end_min.saturating_sub(start_min)) / 60.0;
    (hours * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_times() {
        assert_eq!(parse_hhmm("00:00").unwrap(), 0);
        assert_eq!(parse_hhmm("09:30").unwrap(), 570);
        assert_eq!(parse_hhmm("9:30").unwrap(), 570);
        assert_eq!(parse_hhmm("23:59").unwrap(), 1439);
    }

    #[test]
    fn rejects_malformed_times() {
        for raw in ["", "9", "0930", "24:00", "12:60", "ab:cd", "12:3", "12:345", "-1:00"] {
            assert!(
                matches!(parse_hhmm(raw), Err(TimeRangeError::InvalidTimeFormat(_))),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn window_requires_positive_duration() {
        assert_eq!(validate_window("09:00", "12:00").unwrap(), (540, 720));
        assert_eq!(validate_window("09:00", "09:00"), Err(TimeRangeError::InvalidTime));
        assert_eq!(validate_window("12:00", "09:00"), Err(TimeRangeError::InvalidTime));
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        // 09:00-12:00 followed by 12:00-15:00 is back-to-back, not a clash
        assert!(!windows_overlap((540, 720), (720, 900)));
        assert!(!windows_overlap((720, 900), (540, 720)));
    }

    #[test]
    fn intersecting_windows_overlap() {
        assert!(windows_overlap((540, 720), (600, 660)));
        assert!(windows_overlap((600, 660), (540, 720)));
        assert!(windows_overlap((540, 720), (719, 900)));
    }

    #[test]
    fn hours_round_to_two_decimals() {
        assert_eq!(window_hours(540, 720), 3.0);
        assert_eq!(window_hours(540, 640), 1.67);
        assert_eq!(window_hours(0, 50), 0.83);
    }
}
