//! Core types shared across travel monitor components.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_CITIZEN_ID_DIGITS;
use crate::error::TravelError;

/// Citizen identifier: 1 to 5 decimal digits, compared as written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitizenId(String);

impl CitizenId {
    /// Validate and wrap a citizen id
    pub fn parse(raw: &str) -> Result<Self, TravelError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_CITIZEN_ID_DIGITS
            && raw.bytes().all(|b| b.is_ascii_digit());

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(TravelError::InvalidCitizenId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CitizenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CitizenId {
    type Err = TravelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Immutable biographic identity of a citizen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizen {
    pub first_name: String,
    pub last_name: String,
    pub country: String,
    pub age: u32,
}

/// Vaccination status of one citizen for one virus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaccinationStatus {
    /// Vaccinated on the given date
    Vaccinated(NaiveDate),
    /// Listed as not vaccinated, or unknown to the shard
    NotVaccinated,
}

impl VaccinationStatus {
    pub fn is_vaccinated(&self) -> bool {
        matches!(self, Self::Vaccinated(_))
    }
}

/// Why a travel request was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Bloom negative or listed as not vaccinated
    NotVaccinated,
    /// Vaccination is older than the validity window
    VaccinationExpired,
    /// Vaccination date is after the travel date
    VaccinatedAfterTravel,
}

/// Result of a travel request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TravelOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl TravelOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Accepted/rejected counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub accepted: u64,
    pub rejected: u64,
}

impl Tally {
    pub fn total(&self) -> u64 {
        self.accepted + self.rejected
    }

    /// Count one outcome
    pub fn record(&mut self, accepted: bool) {
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }
}

impl std::ops::AddAssign for Tally {
    fn add_assign(&mut self, other: Self) {
        self.accepted += other.accepted;
        self.rejected += other.rejected;
    }
}
