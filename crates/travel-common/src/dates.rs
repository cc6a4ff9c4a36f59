//! Date syntax, chronological ordering, and the vaccination window.

use std::cmp::Ordering;

use chrono::{Months, NaiveDate};

use crate::constants::VACCINATION_VALIDITY_MONTHS;
use crate::error::TravelError;

/// Accepted formats, each with the position of its year field
const FORMATS: [(&str, usize); 2] = [("%Y-%m-%d", 0), ("%d-%m-%Y", 2)];

/// Where a travel date falls relative to a vaccination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Within [vaccination, vaccination + validity]
    Within,
    /// Travel is after the vaccination stopped being valid
    Expired,
    /// Travel is before the vaccination
    BeforeVaccination,
}

/// Parse a date in `YYYY-MM-DD` or `DD-MM-YYYY` form. The year is always
/// four digits.
pub fn parse(raw: &str) -> Result<NaiveDate, TravelError> {
    let fields: Vec<&str> = raw.split('-').collect();
    if fields.len() == 3 {
        for (fmt, year_at) in FORMATS {
            let year = fields[year_at];
            if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
                    return Ok(date);
                }
            }
        }
    }
    Err(TravelError::InvalidDate(raw.to_string()))
}

/// Syntax check only
pub fn validate(raw: &str) -> bool {
    parse(raw).is_ok()
}

/// Chronological comparison of two date strings
pub fn compare(first: &str, second: &str) -> Result<Ordering, TravelError> {
    Ok(parse(first)?.cmp(&parse(second)?))
}

/// Classify a travel date against a vaccination date.
pub fn within_half_year(vaccinated: NaiveDate, travel: NaiveDate) -> Window {
    if travel < vaccinated {
        return Window::BeforeVaccination;
    }

    let expires = vaccinated
        .checked_add_months(Months::new(VACCINATION_VALIDITY_MONTHS))
        .unwrap_or(NaiveDate::MAX);

    if travel > expires {
        Window::Expired
    } else {
        Window::Within
    }
}
