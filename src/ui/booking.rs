//! # Booking Quote
//!
//! Nights and total for a stay. Quotes are display-only; nothing is reserved.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const MS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Neither `YYYY-MM-DD` nor RFC 3339
    InvalidDate { input: String },
}

impl fmt::Display for BookingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDate { input } => write!(
                f,
                "Invalid date '{}': expected YYYY-MM-DD or an RFC 3339 timestamp",
                input
            ),
        }
    }
}

impl std::error::Error for BookingError {}

/// Nights between check-in and check-out, rounding a partial day up.
/// A check-out on or before check-in gives 0.
pub fn nights_between(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> u64 {
    let ms = (check_out - check_in).num_milliseconds();
    if ms <= 0 {
        return 0;
    }
    // ceil for positive values
    ((ms + MS_PER_DAY - 1) / MS_PER_DAY) as u64
}

/// Parse a calendar date (midnight UTC) or a full timestamp
pub fn parse_stay_date(input: &str) -> Result<DateTime<Utc>, BookingError> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| BookingError::InvalidDate {
            input: input.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub nightly_rate: u64,
    pub nights: u64,
    pub total: u64,
}

impl Quote {
    pub fn new(check_in: DateTime<Utc>, check_out: DateTime<Utc>, nightly_rate: u64) -> Self {
        let nights = nights_between(check_in, check_out);
        Self {
            check_in,
            check_out,
            nightly_rate,
            nights,
            total: nightly_rate.saturating_mul(nights),
        }
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {} night(s) x {} = {}",
            self.check_in.format("%Y-%m-%d"),
            self.check_out.format("%Y-%m-%d"),
            self.nights,
            self.nightly_rate,
            self.total
        )
    }
}
