//! Loaders for pre-aligned tick files and expiry calendars.
//!
//! Ticks arrive as JSON lines, one [`Tick`] per line, already aligned and
//! forward-filled across the front and back month. Calendars are a JSON
//! array of `YYYY-MM-DD` dates.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::debug;

use crate::models::{ExpiryCalendar, Tick};

/// Read every tick from a JSON-lines file. Blank lines are skipped.
pub fn load_ticks(path: &Path) -> Result<Vec<Tick>> {
    let file = File::open(path).with_context(|| format!("Failed to open ticks {}", path.display()))?;
    let ticks = parse_ticks(BufReader::new(file))
        .with_context(|| format!("Failed to read ticks {}", path.display()))?;
    debug!(path = %path.display(), count = ticks.len(), "Loaded ticks");
    Ok(ticks)
}

fn parse_ticks<R: BufRead>(reader: R) -> Result<Vec<Tick>> {
    let mut ticks = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("line {}", idx + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let tick: Tick =
            serde_json::from_str(line).with_context(|| format!("Malformed tick on line {}", idx + 1))?;
        ticks.push(tick);
    }
    Ok(ticks)
}

/// Read an expiry calendar from a JSON array of dates.
pub fn load_calendar(path: &Path) -> Result<ExpiryCalendar> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read calendar {}", path.display()))?;
    parse_calendar(&data).with_context(|| format!("Invalid calendar {}", path.display()))
}

fn parse_calendar(data: &str) -> Result<ExpiryCalendar> {
    let dates: Vec<NaiveDate> = serde_json::from_str(data)?;
    Ok(ExpiryCalendar::new(dates)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_ticks_skips_blank_lines() {
        let input = r#"
{"timestamp":"2024-01-02T09:00:00","date":"2024-01-02","ticker":"VN30F2401","front_price":"1130.5","front_close":"1131"}

{"timestamp":"2024-01-02T09:00:03","date":"2024-01-02","ticker":"VN30F2401","front_price":"1131.1","front_close":"1131","back_price":"1133"}
"#;
        let ticks = parse_ticks(input.as_bytes()).unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].front_price, Some(dec!(1130.5)));
        assert_eq!(ticks[0].back_price, None);
        assert_eq!(ticks[1].back_price, Some(dec!(1133)));
    }

    #[test]
    fn test_parse_ticks_reports_line_number() {
        let input = "{\"timestamp\":\"2024-01-02T09:00:00\",\"date\":\"2024-01-02\",\"ticker\":\"X\"}\nnot json\n";
        let err = parse_ticks(input.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn test_parse_calendar() {
        let cal = parse_calendar(r#"["2024-01-18", "2024-02-15"]"#).unwrap();
        assert_eq!(cal.len(), 2);
        assert_eq!(cal.peek(), NaiveDate::from_ymd_opt(2024, 1, 18));

        assert!(parse_calendar(r#"["2024-02-15", "2024-01-18"]"#).is_err());
        assert!(parse_calendar("{}").is_err());
    }
}
