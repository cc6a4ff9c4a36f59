//! # Travel Monitor
//!
//! Sharded travel clearance service. A coordinator process deals countries
//! out to worker processes, answers travel queries with a bloom filter fast
//! path plus an authoritative lookup on the owning worker, and replaces
//! workers that die.
//!
//! ## Architecture
//! ```text
//!             stdin commands
//!                   |
//!              Coordinator ---- bloom cache per worker
//!             /     |     \
//!      Worker 0  Worker 1  Worker N     (framed pipes, one per worker)
//!         |         |         |
//!     countries  countries  countries   (input_dir/<Country>/*)
//! ```

pub mod command;
pub mod config;
pub mod coordinator;
pub mod protocol;
pub mod session;
pub mod shard;
pub mod summary;
pub mod triggers;
pub mod worker;

pub use command::Command;
pub use config::AppConfig;
pub use coordinator::Coordinator;
