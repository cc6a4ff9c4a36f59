//! Shard data owned by one worker.

mod ingest;
mod store;

pub use ingest::{IngestReport, ingest_country_dir};
pub use store::{ShardStore, VirusIndex};
