//! OS signals as a queue of asynchronous triggers.
//!
//! Signals are registered once at startup and only polled from the main loop
//! between commands, so a trigger that arrives mid-command waits until the
//! command is finished.

use std::io;

use tokio::signal::unix::{Signal, SignalKind, signal};

/// Asynchronous local events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// SIGINT or SIGQUIT
    Terminate,
    /// SIGUSR1: rescan owned countries and stream snapshots
    Refresh,
    /// SIGCHLD: one or more workers exited
    ChildExited,
}

/// Registered signal streams for one process role
pub struct Triggers {
    interrupt: Signal,
    quit: Signal,
    refresh: Option<Signal>,
    child: Option<Signal>,
}

impl Triggers {
    /// Terminate and child-exit triggers
    pub fn coordinator() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            refresh: None,
            child: Some(signal(SignalKind::child())?),
        })
    }

    /// Terminate and refresh triggers
    pub fn worker() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            refresh: Some(signal(SignalKind::user_defined1())?),
            child: None,
        })
    }

    /// Wait for the next trigger. Termination is checked first.
    ///
    /// Cancel safe: a pending signal stays queued if this future is dropped.
    pub async fn next(&mut self) -> Trigger {
        tokio::select! {
            biased;
            Some(()) = self.interrupt.recv() => Trigger::Terminate,
            Some(()) = self.quit.recv() => Trigger::Terminate,
            Some(()) = recv_optional(&mut self.child) => Trigger::ChildExited,
            Some(()) = recv_optional(&mut self.refresh) => Trigger::Refresh,
            else => std::future::pending::<Trigger>().await,
        }
    }
}

async fn recv_optional(signal: &mut Option<Signal>) -> Option<()> {
    match signal {
        Some(signal) => signal.recv().await,
        None => std::future::pending().await,
    }
}
