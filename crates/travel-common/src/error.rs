//! Common error types for travel monitor components.

use thiserror::Error;

/// Errors surfaced by queries, bootstrap, and supervision
#[derive(Debug, Error)]
pub enum TravelError {
    /// Citizen id is not 1-5 decimal digits
    #[error("Invalid citizen id: {0}")]
    InvalidCitizenId(String),

    /// Date does not parse as a calendar date
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// First date of a range is after the second
    #[error("Invalid date range: {from} is after {to}")]
    InvalidDateRange { from: String, to: String },

    /// Country has no owning worker
    #[error("Country {0} does not exist in the database")]
    UnknownCountry(String),

    /// No bloom filter for the virus in the country's shard
    #[error("Virus {virus} is not tracked in {country}")]
    VirusNotTracked { virus: String, country: String },

    /// Malformed or unexpected message on a worker channel
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Worker channel closed mid-exchange
    #[error("Worker {0} is unavailable")]
    WorkerUnavailable(usize),

    /// Could not create a channel, start a worker, or open a directory
    #[error("Resource error: {0}")]
    Resource(String),

    /// Filesystem or pipe I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TravelError {
    /// Returns true if this error must end the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Resource(_) | Self::Io(_))
    }

    /// Returns true if this error comes from bad command arguments
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCitizenId(_)
                | Self::InvalidDate(_)
                | Self::InvalidDateRange { .. }
                | Self::UnknownCountry(_)
                | Self::VirusNotTracked { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(TravelError::Protocol("bad kind".into()).is_fatal());
        assert!(!TravelError::WorkerUnavailable(2).is_fatal());
        assert!(TravelError::UnknownCountry("Atlantis".into()).is_argument_error());
        assert!(!TravelError::WorkerUnavailable(2).is_argument_error());
    }
}
