//! Coordinator-side view of one worker process.

use std::collections::HashMap;
use std::process::Stdio;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use travel_common::{BloomFilter, TravelError};

use crate::config::AppConfig;
use crate::protocol::{Channel, ChannelError, Message};

/// Channel to a worker over its stdout/stdin
pub type WorkerChannel = Channel<ChildStdout, ChildStdin>;

/// One worker slot: the process currently filling it, its channel, and the
/// bloom filters harvested from it. The slot index and the bloom cache
/// outlive any single process.
pub struct WorkerHandle {
    pub(crate) index: usize,
    pub(crate) child: Child,
    pub(crate) channel: WorkerChannel,
    pub(crate) blooms: HashMap<String, BloomFilter>,
    pub(crate) vacc_queries: u64,
}

impl WorkerHandle {
    /// Start a worker process and open its channel.
    pub fn spawn(index: usize, config: &AppConfig) -> Result<Self, TravelError> {
        let (child, channel) = spawn_process(index, config)?;
        Ok(Self {
            index,
            child,
            channel,
            blooms: HashMap::new(),
            vacc_queries: 0,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// OS pid of the current process, `None` once it has been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// VACC_QUERY round trips issued to this worker slot
    pub fn vacc_queries(&self) -> u64 {
        self.vacc_queries
    }

    pub fn bloom(&self, virus: &str) -> Option<&BloomFilter> {
        self.blooms.get(virus)
    }

    pub fn bloom_count(&self) -> usize {
        self.blooms.len()
    }

    /// Send INIT; the caller collects the acknowledgement.
    pub async fn send_init(&mut self, config: &AppConfig) -> Result<(), TravelError> {
        let init = Message::Init {
            buffer_size: wire_size("buffer size", config.buffer_size)?,
            bloom_size: wire_size("bloom filter size", config.bloom_size)?,
        };
        self.send(&init).await
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), TravelError> {
        self.channel
            .send(message)
            .await
            .map_err(|e| e.for_worker(self.index))
    }

    pub async fn recv(&mut self) -> Result<Message, TravelError> {
        self.channel.recv().await.map_err(|e| e.for_worker(self.index))
    }

    /// Receive and require the phase terminator
    pub async fn expect_done(&mut self) -> Result<(), TravelError> {
        match self.recv().await? {
            Message::Done => Ok(()),
            other => Err(ChannelError::Unexpected(other.kind()).for_worker(self.index)),
        }
    }

    /// Insert or replace the cached filter for a virus
    pub fn merge_snapshot(&mut self, virus: String, bits: Vec<u8>) {
        match self.blooms.get_mut(&virus) {
            Some(bloom) => bloom.overwrite(bits),
            None => {
                self.blooms.insert(virus, BloomFilter::from_bytes(bits));
            }
        }
    }

    /// Deliver a signal to the worker process.
    pub fn signal(&self, sig: Signal) -> Result<(), TravelError> {
        let pid = self.pid().ok_or(TravelError::WorkerUnavailable(self.index))?;
        match signal::kill(Pid::from_raw(pid as i32), sig) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => Err(TravelError::WorkerUnavailable(self.index)),
            Err(e) => Err(TravelError::Resource(format!(
                "cannot signal worker {}: {}",
                self.index, e
            ))),
        }
    }

    /// Swap in a freshly started process, keeping index and bloom cache.
    pub(crate) fn replace_process(&mut self, child: Child, channel: WorkerChannel) {
        self.child = child;
        self.channel = channel;
    }
}

fn wire_size(what: &str, value: usize) -> Result<u32, TravelError> {
    u32::try_from(value).map_err(|_| TravelError::Resource(format!("{} {} does not fit in an INIT message", what, value)))
}

/// Start the worker program with a piped stdin/stdout channel.
pub(crate) fn spawn_process(index: usize, config: &AppConfig) -> Result<(Child, WorkerChannel), TravelError> {
    let program = config
        .worker_program()
        .map_err(|e| TravelError::Resource(e.to_string()))?;

    let mut command = Command::new(&program);
    command
        .arg("worker")
        .arg("--log-dir")
        .arg(&config.log_dir)
        .arg("--log-level")
        .arg(&config.log_level)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    if config.json_logs {
        command.arg("--json-logs");
    }

    let mut child = command.spawn().map_err(|e| {
        TravelError::Resource(format!("cannot start worker {} ({}): {}", index, program.display(), e))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| TravelError::Resource(format!("worker {} has no stdin pipe", index)))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TravelError::Resource(format!("worker {} has no stdout pipe", index)))?;

    tracing::debug!(worker = index, pid = ?child.id(), "Worker process started");

    Ok((child, Channel::with_buffer_size(stdout, stdin, config.buffer_size)))
}
