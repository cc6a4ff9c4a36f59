//! Worker supervision and shutdown.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::time::{Instant, timeout_at};
use travel_common::{Tally, TravelError};

use super::handle::spawn_process;
use super::{Coordinator, country_dir};
use crate::protocol::Message;
use crate::summary;

impl Coordinator {
    /// Reap exited workers and refill their slots.
    ///
    /// Each replacement re-ingests the slot's countries from the source files
    /// with ASSIGN_SILENT; the bloom filters already cached for the slot stay
    /// in use. A failed replacement is logged and does not stop the others.
    /// Returns the number of slots refilled.
    pub async fn replace_exited_workers(&mut self) -> usize {
        let mut replaced = 0;
        for index in 0..self.workers.len() {
            match self.workers[index].child.try_wait() {
                Ok(None) => continue,
                Ok(Some(status)) => {
                    tracing::warn!(worker = index, status = %status, "Worker exited, replacing");
                }
                Err(e) => {
                    tracing::error!(worker = index, error = %e, "Failed to poll worker status");
                    continue;
                }
            }

            match self.replace_worker(index).await {
                Ok(()) => {
                    replaced += 1;
                    tracing::info!(worker = index, pid = ?self.workers[index].pid(), "Worker replaced");
                }
                Err(e) => tracing::error!(worker = index, error = %e, "Worker replacement failed"),
            }
        }
        replaced
    }

    async fn replace_worker(&mut self, index: usize) -> Result<(), TravelError> {
        let (child, channel) = spawn_process(index, &self.config)?;
        let dirs: Vec<String> = self
            .shard_map
            .countries_of(index)
            .map(|country| country_dir(&self.config, country))
            .collect();

        let handle = &mut self.workers[index];
        handle.replace_process(child, channel);

        handle.send_init(&self.config).await?;
        handle.expect_done().await?;

        for country_dir in dirs {
            handle.send(&Message::AssignSilent { country_dir }).await?;
        }
        handle.send(&Message::Done).await?;
        handle.expect_done().await
    }

    /// Stop every worker and write the coordinator summary.
    ///
    /// Workers get SIGINT so they can write their own summaries; any still
    /// running after the grace period is killed. All are reaped.
    pub async fn shutdown(&mut self) -> Option<PathBuf> {
        for handle in &self.workers {
            if let Err(e) = handle.signal(Signal::SIGINT) {
                tracing::debug!(worker = handle.index, error = %e, "Worker not signalled");
            }
        }

        let deadline = Instant::now() + Duration::from_millis(self.config.shutdown_grace_ms);
        for handle in self.workers.iter_mut() {
            match timeout_at(deadline, handle.child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!(worker = handle.index, status = %status, "Worker exited");
                }
                Ok(Err(e)) => {
                    tracing::warn!(worker = handle.index, error = %e, "Failed to wait for worker");
                }
                Err(_) => {
                    tracing::warn!(worker = handle.index, "Worker did not exit in time, killing");
                    if let Err(e) = handle.child.kill().await {
                        tracing::warn!(worker = handle.index, error = %e, "Failed to kill worker");
                    }
                }
            }
        }

        write_summary(&self.config.log_dir, self.shard_map.countries(), self.totals).await
    }
}

/// Write this process's summary; failures are logged only.
pub(super) async fn write_summary<'a>(
    log_dir: &Path,
    countries: impl IntoIterator<Item = &'a str>,
    tally: Tally,
) -> Option<PathBuf> {
    match summary::write(log_dir, std::process::id(), countries, tally).await {
        Ok(path) => {
            tracing::info!(path = %path.display(), "Summary written");
            Some(path)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to write summary");
            None
        }
    }
}
