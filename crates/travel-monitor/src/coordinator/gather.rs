//! Multi-worker gather.
//!
//! Reads from every participating channel concurrently and hands each
//! message to a callback as it arrives. A worker leaves the gather when it
//! sends DONE. Inter-worker order is whatever readiness order the channels
//! produce; per-worker order is preserved.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use travel_common::TravelError;

use super::WorkerHandle;
use crate::protocol::Message;

async fn recv_from(handle: &mut WorkerHandle) -> (&mut WorkerHandle, Result<Message, TravelError>) {
    let received = handle.recv().await;
    (handle, received)
}

/// Collect messages from `handles` until each has sent DONE.
///
/// A failing worker drops out of the gather while the others are drained to
/// their terminator, so their channels stay in step. The first error is
/// returned once everyone is finished.
pub async fn gather<'a, I, F>(handles: I, mut on_message: F) -> Result<(), TravelError>
where
    I: IntoIterator<Item = &'a mut WorkerHandle>,
    F: FnMut(&mut WorkerHandle, Message) -> Result<(), TravelError>,
{
    let mut pending: FuturesUnordered<_> = handles.into_iter().map(recv_from).collect();
    let mut first_error = None;

    while let Some((handle, received)) = pending.next().await {
        match received {
            Ok(Message::Done) => {}
            Ok(message) => {
                if let Err(e) = on_message(handle, message) {
                    first_error.get_or_insert(e);
                }
                pending.push(recv_from(handle));
            }
            Err(e) => {
                tracing::warn!(worker = handle.index, error = %e, "Worker dropped out of gather");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
