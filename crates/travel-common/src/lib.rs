//! # Travel Common
//!
//! Shared types, errors, and record primitives used by the travel monitor
//! coordinator and its workers.
//!
//! ## Modules
//! - `types` - Core domain types (CitizenId, VaccinationStatus, Tally, ...)
//! - `error` - Common error types
//! - `constants` - Shared protocol and policy constants
//! - `bloom` - Insert-only bloom filter over citizen ids
//! - `ordered_index` - Id-ordered index backing the vaccination lists
//! - `dates` - Date syntax, ordering, and the vaccination window
//! - `record` - Record-file line parsing

pub mod bloom;
pub mod constants;
pub mod dates;
pub mod error;
pub mod ordered_index;
pub mod record;
pub mod types;

pub use bloom::BloomFilter;
pub use error::TravelError;
pub use ordered_index::OrderedIndex;
pub use record::{RecordError, RecordLine};
pub use types::*;
