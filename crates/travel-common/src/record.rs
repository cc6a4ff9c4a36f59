//! Record-file line parsing.
//!
//! Line grammar (whitespace separated):
//! ```text
//! citizenId firstName lastName country age virus YES|NO [date]
//! ```

use std::fmt;

use thiserror::Error;

use crate::constants::flags;
use crate::types::{Citizen, CitizenId};

/// Why an ingested line was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Line does not match the record grammar
    #[error("MALFORMED RECORD ({0})")]
    Malformed(String),

    /// Same id already known with different biographic fields
    #[error("INCONSISTENT INPUT DATA")]
    InconsistentIdentity,

    /// Same (id, virus) pair already present
    #[error("INPUT DATA DUPLICATION")]
    Duplicate,

    /// YES without a date, NO with a date, or an unparseable date
    #[error("INVALID INPUT DATA FORM")]
    InvalidForm,
}

/// One parsed record line, not yet validated against the shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLine {
    pub citizen_id: CitizenId,
    pub citizen: Citizen,
    pub virus: String,
    pub vaccinated: bool,
    /// Raw date text, checked later as part of the form validation
    pub date: Option<String>,
}

impl RecordLine {
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 7 && fields.len() != 8 {
            return Err(RecordError::Malformed(format!(
                "expected 7 or 8 fields, found {}",
                fields.len()
            )));
        }

        let citizen_id = CitizenId::parse(fields[0])
            .map_err(|e| RecordError::Malformed(e.to_string()))?;
        let age = fields[4]
            .parse::<u32>()
            .map_err(|_| RecordError::Malformed(format!("invalid age {}", fields[4])))?;
        let vaccinated = match fields[6] {
            flags::VACCINATED => true,
            flags::NOT_VACCINATED => false,
            other => {
                return Err(RecordError::Malformed(format!(
                    "invalid vaccination flag {}",
                    other
                )));
            }
        };

        Ok(Self {
            citizen_id,
            citizen: Citizen {
                first_name: fields[1].to_string(),
                last_name: fields[2].to_string(),
                country: fields[3].to_string(),
                age,
            },
            virus: fields[5].to_string(),
            vaccinated,
            date: fields.get(7).map(|d| d.to_string()),
        })
    }
}

impl fmt::Display for RecordLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.citizen_id,
            self.citizen.first_name,
            self.citizen.last_name,
            self.citizen.country,
            self.citizen.age,
            self.virus,
            if self.vaccinated { flags::VACCINATED } else { flags::NOT_VACCINATED },
        )?;
        if let Some(date) = &self.date {
            write!(f, " {}", date)?;
        }
        Ok(())
    }
}
