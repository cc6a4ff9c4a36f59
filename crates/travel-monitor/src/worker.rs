//! Worker process: one shard behind one channel.
//!
//! Lifecycle on the channel:
//! ```text
//! INIT -> DONE
//! (ASSIGN | ASSIGN_SILENT)* DONE -> BLOOM_SNAPSHOT* DONE   (or just DONE if silent)
//! then commands until the coordinator goes away or a terminate trigger
//! ```

use std::fs::File;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::unix::pipe;
use travel_common::{CitizenId, VaccinationStatus};

use crate::config::WorkerArgs;
use crate::protocol::{Channel, ChannelError, Message};
use crate::shard::{ShardStore, ingest_country_dir};
use crate::summary;
use crate::triggers::{Trigger, Triggers};

/// Channel over the worker's stdin/stdout
pub type StdioChannel = Channel<pipe::Receiver, pipe::Sender>;

/// A shard and the channel it is served on
pub struct Worker<R, W> {
    channel: Channel<R, W>,
    store: ShardStore,
    /// Country directories assigned so far, for refresh rescans
    assigned: Vec<PathBuf>,
    log_dir: PathBuf,
}

impl<R, W> Worker<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wait for INIT, apply the negotiated sizes, and acknowledge.
    pub async fn handshake(mut channel: Channel<R, W>, log_dir: PathBuf) -> Result<Self, ChannelError> {
        let (buffer_size, bloom_size) = match channel.recv().await? {
            Message::Init {
                buffer_size,
                bloom_size,
            } => (buffer_size as usize, bloom_size as usize),
            other => return Err(ChannelError::Unexpected(other.kind())),
        };

        channel.set_buffer_size(buffer_size);
        channel.send(&Message::Done).await?;

        tracing::debug!(buffer_size, bloom_size, "Handshake complete");

        Ok(Self {
            channel,
            store: ShardStore::new(bloom_size),
            assigned: Vec::new(),
            log_dir,
        })
    }

    /// Bootstrap assignment phase.
    ///
    /// Ingests every assigned directory until DONE, then streams all bloom
    /// snapshots. If any assignment was silent the coordinator already has
    /// the snapshots, so only DONE is sent.
    pub async fn receive_assignments(&mut self) -> Result<(), ChannelError> {
        let mut silent = false;
        loop {
            match self.channel.recv().await? {
                Message::Assign { country_dir } => self.ingest(Path::new(&country_dir)),
                Message::AssignSilent { country_dir } => {
                    silent = true;
                    self.ingest(Path::new(&country_dir));
                }
                Message::Done => break,
                other => return Err(ChannelError::Unexpected(other.kind())),
            }
        }

        tracing::info!(
            countries = self.assigned.len(),
            silent,
            "Assignments ingested"
        );

        if silent {
            self.channel.send(&Message::Done).await
        } else {
            self.send_snapshots().await
        }
    }

    /// Answer one command-phase message.
    pub async fn handle(&mut self, message: Message) -> Result<(), ChannelError> {
        match message {
            Message::Assign { country_dir } | Message::AssignSilent { country_dir } => {
                self.ingest(Path::new(&country_dir));
                self.channel.send(&Message::Done).await
            }
            Message::VaccQuery { citizen_id, virus } => {
                let status = match CitizenId::parse(&citizen_id) {
                    Ok(id) => self.store.vaccination_status(&id, &virus),
                    Err(_) => VaccinationStatus::NotVaccinated,
                };
                self.channel.send(&Message::VaccAnswer { status }).await
            }
            Message::StatusQuery { citizen_id } => self.answer_status(&citizen_id).await,
            Message::OutcomeNotice { accepted } => {
                self.store.record_outcome(accepted);
                self.channel.send(&Message::Done).await
            }
            other => Err(ChannelError::Unexpected(other.kind())),
        }
    }

    /// Rescan every owned country and stream all snapshots.
    pub async fn refresh(&mut self) -> Result<(), ChannelError> {
        for dir in self.assigned.clone() {
            self.ingest(&dir);
        }
        self.send_snapshots().await
    }

    /// Best-effort summary write; failures are only logged.
    pub async fn write_summary(&self) {
        let pid = std::process::id();
        match summary::write(&self.log_dir, pid, self.store.countries(), self.store.tally()).await {
            Ok(path) => tracing::info!(path = %path.display(), "Summary written"),
            Err(e) => tracing::error!(error = %e, "Failed to write summary"),
        }
    }

    /// Serve commands, acting on triggers only between messages.
    ///
    /// Returns `Ok` on a terminate trigger. A closed channel surfaces as
    /// `ChannelError::Closed`.
    pub async fn serve(&mut self, triggers: &mut Triggers) -> Result<(), ChannelError> {
        loop {
            tokio::select! {
                biased;
                trigger = triggers.next() => match trigger {
                    Trigger::Terminate => {
                        tracing::info!("Terminate trigger received");
                        self.write_summary().await;
                        return Ok(());
                    }
                    Trigger::Refresh => {
                        tracing::debug!("Refresh trigger received");
                        self.refresh().await?;
                    }
                    Trigger::ChildExited => {}
                },
                received = self.channel.recv() => self.handle(received?).await?,
            }
        }
    }

    pub fn store(&self) -> &ShardStore {
        &self.store
    }

    fn ingest(&mut self, dir: &Path) {
        if !self.assigned.iter().any(|known| known == dir) {
            self.assigned.push(dir.to_path_buf());
        }
        if let Err(e) = ingest_country_dir(&mut self.store, dir) {
            tracing::error!(dir = %dir.display(), error = %e, "Failed to ingest country directory");
        }
    }

    async fn send_snapshots(&mut self) -> Result<(), ChannelError> {
        let snapshots: Vec<Message> = self
            .store
            .blooms()
            .map(|(virus, bloom)| Message::BloomSnapshot {
                virus: virus.to_string(),
                bits: bloom.as_bytes().to_vec(),
            })
            .collect();

        for snapshot in &snapshots {
            self.channel.send(snapshot).await?;
        }
        self.channel.send(&Message::Done).await
    }

    async fn answer_status(&mut self, citizen_id: &str) -> Result<(), ChannelError> {
        let id = CitizenId::parse(citizen_id).ok();
        let mut replies = Vec::new();

        if let Some(citizen) = id.as_ref().and_then(|id| self.store.citizen(id)) {
            replies.push(Message::PersonInfo {
                first_name: citizen.first_name.clone(),
                last_name: citizen.last_name.clone(),
                country: citizen.country.clone(),
                age: citizen.age,
            });
        }
        if let Some(id) = &id {
            replies.extend(self.store.vaccinations_of(id).into_iter().map(|(virus, status)| {
                Message::PersonVacc {
                    virus: virus.to_string(),
                    status,
                }
            }));
        }

        for reply in &replies {
            self.channel.send(reply).await?;
        }
        self.channel.send(&Message::Done).await
    }
}

/// Open the coordinator channel on stdin/stdout.
fn stdio_channel() -> std::io::Result<StdioChannel> {
    let stdin = std::io::stdin().as_fd().try_clone_to_owned()?;
    let stdout = std::io::stdout().as_fd().try_clone_to_owned()?;
    let reader = pipe::Receiver::from_file(File::from(stdin))?;
    let writer = pipe::Sender::from_file(File::from(stdout))?;
    Ok(Channel::new(reader, writer))
}

/// Worker process entry point
pub async fn run(args: WorkerArgs) -> Result<()> {
    // Register before anything else so early signals are queued, not fatal
    let mut triggers = Triggers::worker().context("Failed to register signal handlers")?;
    let channel = stdio_channel().context("Failed to open the coordinator channel")?;

    tracing::info!(pid = std::process::id(), "Worker starting");

    let mut worker = match Worker::handshake(channel, args.log_dir).await {
        Ok(worker) => worker,
        Err(ChannelError::Closed) => return Ok(()),
        Err(e) => return Err(e).context("Handshake failed"),
    };

    let result = match worker.receive_assignments().await {
        Ok(()) => worker.serve(&mut triggers).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Ok(()),
        Err(ChannelError::Closed) => {
            tracing::info!("Coordinator closed the channel, exiting");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal channel error");
            worker.write_summary().await;
            Err(e).context("Worker failed")
        }
    }
}
