//! Display text formatting and time-string parsing

use chrono::NaiveTime;

use super::TimerError;

/// Format whole seconds as `MM:SS`, or `HH:MM:SS` once an hour is reached.
///
/// Fractional seconds are truncated, so a countdown shows its full duration
/// until a whole second has actually passed.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Format a countdown overrun with a leading minus sign.
///
/// Less than one whole second of overrun renders as a plain `00:00`.
pub fn format_overrun(overrun_seconds: f64) -> String {
    if overrun_seconds < 1.0 {
        format_clock(0.0)
    } else {
        format!("-{}", format_clock(overrun_seconds))
    }
}

/// Parse an operator-entered duration: `"90"`, `"MM:SS"` or `"HH:MM:SS"`.
pub fn parse_duration(input: &str) -> Result<f64, TimerError> {
    let malformed = || TimerError::MalformedTime(input.to_string());
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(malformed());
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return Err(malformed());
    }

    let mut fields = Vec::with_capacity(parts.len());
    for part in &parts {
        let value: u64 = part.trim().parse().map_err(|_| malformed())?;
        fields.push(value);
    }

    // Minutes and seconds fields must stay below 60 when they are not leading.
    if fields.iter().skip(1).any(|&v| v >= 60) {
        return Err(malformed());
    }

    let total = fields.iter().fold(0u64, |acc, &v| acc * 60 + v);
    Ok(total as f64)
}

/// Validate a scheduled start label (`HH:MM`, 24-hour clock).
pub fn parse_start_label(input: &str) -> Result<String, TimerError> {
    let trimmed = input.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| TimerError::MalformedTime(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock_minutes() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(5.9), "00:05");
        assert_eq!(format_clock(600.0), "10:00");
    }

    #[test]
    fn test_format_clock_hours() {
        assert_eq!(format_clock(3600.0), "01:00:00");
        assert_eq!(format_clock(3725.0), "01:02:05");
    }

    #[test]
    fn test_format_clock_rejects_garbage() {
        assert_eq!(format_clock(-3.0), "00:00");
        assert_eq!(format_clock(f64::NAN), "00:00");
    }

    #[test]
    fn test_format_overrun() {
        assert_eq!(format_overrun(5.0), "-00:05");
        assert_eq!(format_overrun(0.4), "00:00");
        assert_eq!(format_overrun(61.2), "-01:01");
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("90").unwrap(), 90.0);
        assert_eq!(parse_duration("05:30").unwrap(), 330.0);
        assert_eq!(parse_duration("1:00:00").unwrap(), 3600.0);
        assert_eq!(parse_duration(" 2:05 ").unwrap(), 125.0);
    }

    #[test]
    fn test_parse_duration_malformed() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("1:75").is_err());
        assert!(parse_duration("-5").is_err());
        assert!(parse_duration("1:2:3:4").is_err());
    }

    #[test]
    fn test_parse_start_label() {
        assert_eq!(parse_start_label("09:30").unwrap(), "09:30");
        assert_eq!(parse_start_label("9:05").unwrap(), "09:05");
        assert!(parse_start_label("25:00").is_err());
        assert!(parse_start_label("noon").is_err());
    }
}
