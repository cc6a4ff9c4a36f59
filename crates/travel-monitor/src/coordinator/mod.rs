//! Coordinator: owns the worker pool, the country map, and the query caches.
//!
//! ## Bootstrap
//! ```text
//! spawn N workers -> INIT to all -> gather DONE
//! ASSIGN each worker its countries + DONE -> gather BLOOM_SNAPSHOT* until DONE
//! ```
//! After bootstrap every command runs to completion before the next trigger
//! (child exit, terminate) is looked at.

mod gather;
mod handle;
mod queries;
mod shard_map;
mod stats;
mod supervisor;

pub use gather::gather;
pub use handle::{WorkerChannel, WorkerHandle};
pub use queries::StatusReport;
pub use shard_map::{ShardMap, discover_countries};
pub use stats::TravelStats;

use std::path::PathBuf;

use travel_common::{Tally, TravelError};

use crate::config::AppConfig;
use crate::protocol::{ChannelError, Message};

pub struct Coordinator {
    config: AppConfig,
    workers: Vec<WorkerHandle>,
    shard_map: ShardMap,
    stats: TravelStats,
    /// Outcomes of every travel request, for the exit summary
    totals: Tally,
}

impl Coordinator {
    /// Start the workers, hand out countries, and harvest bloom filters.
    ///
    /// Any failure here is fatal: workers already started are killed when
    /// their handles drop, and an empty coordinator summary is written.
    pub async fn start(config: AppConfig) -> Result<Self, TravelError> {
        match bootstrap(&config).await {
            Ok((workers, shard_map)) => Ok(Self {
                config,
                workers,
                shard_map,
                stats: TravelStats::default(),
                totals: Tally::default(),
            }),
            Err(e) => {
                let countries = discover_countries(&config.input_dir).unwrap_or_default();
                supervisor::write_summary(&config.log_dir, countries.iter().map(String::as_str), Tally::default())
                    .await;
                Err(e)
            }
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn shard_map(&self) -> &ShardMap {
        &self.shard_map
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    pub fn worker(&self, index: usize) -> Option<&WorkerHandle> {
        self.workers.get(index)
    }

    /// Accepted/rejected totals over every travel request so far
    pub fn totals(&self) -> Tally {
        self.totals
    }

    fn owner(&self, country: &str) -> Result<usize, TravelError> {
        self.shard_map
            .owner(country)
            .ok_or_else(|| TravelError::UnknownCountry(country.to_string()))
    }
}

async fn bootstrap(config: &AppConfig) -> Result<(Vec<WorkerHandle>, ShardMap), TravelError> {
    let countries = discover_countries(&config.input_dir)?;
    let worker_count = config.num_workers.min(countries.len());
    if worker_count < config.num_workers {
        tracing::warn!(
            requested = config.num_workers,
            countries = countries.len(),
            "Fewer countries than workers, starting one worker per country"
        );
    }

    let shard_map = ShardMap::round_robin(countries, worker_count);
    let mut workers = (0..worker_count)
        .map(|index| WorkerHandle::spawn(index, config))
        .collect::<Result<Vec<_>, _>>()?;

    for worker in workers.iter_mut() {
        worker.send_init(config).await?;
    }
    gather(workers.iter_mut(), |handle, message| {
        Err(ChannelError::Unexpected(message.kind()).for_worker(handle.index))
    })
    .await?;

    for worker in workers.iter_mut() {
        for country in shard_map.countries_of(worker.index) {
            let country_dir = country_dir(config, country);
            worker.send(&Message::Assign { country_dir }).await?;
        }
        worker.send(&Message::Done).await?;
    }
    gather(workers.iter_mut(), harvest_snapshot).await?;

    tracing::info!(
        workers = worker_count,
        countries = shard_map.len(),
        "🚀 Bootstrap complete"
    );

    Ok((workers, shard_map))
}

/// Path handed to a worker in ASSIGN messages
fn country_dir(config: &AppConfig, country: &str) -> String {
    let dir: PathBuf = config.input_dir.join(country);
    dir.to_string_lossy().into_owned()
}

/// Gather callback: cache each BLOOM_SNAPSHOT, reject anything else
fn harvest_snapshot(handle: &mut WorkerHandle, message: Message) -> Result<(), TravelError> {
    match message {
        Message::BloomSnapshot { virus, bits } => {
            handle.merge_snapshot(virus, bits);
            Ok(())
        }
        other => Err(ChannelError::Unexpected(other.kind()).for_worker(handle.index)),
    }
}
