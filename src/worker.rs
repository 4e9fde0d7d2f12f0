//! Spawns the background thread that owns a selection on the caller's
//! behalf, and the ready-handshake that makes `put` block until ownership
//! is actually held. The thread is this engine's analogue of the source
//! library's forked child process; the handshake replaces its one-byte pipe
//! write with an `mpsc::channel`, and the forked payload copy with an
//! `Arc<[u8]>` the worker thread shares with nobody once spawned.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::atoms::Selection;
use crate::error::{Error, Result};
use crate::owner;

/// A live selection-ownership session started by [`crate::put`].
///
/// Dropping it does not stop the worker — ownership over X11 selections
/// is meant to outlive the process that set it up, same as the source
/// library's detached child. Use [`PutHandle::join`] if you specifically
/// want to block until the selection is lost.
pub struct PutHandle {
    thread: Option<JoinHandle<()>>,
}

impl PutHandle {
    /// Blocks until the worker thread exits, which happens when the
    /// selection is lost to another owner or the connection dies.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            thread.join().ok();
        }
    }
}

/// Spawns the worker thread, blocks until it has taken ownership (or failed
/// to), and returns a handle to it.
pub(crate) fn spawn(selection: Selection, payload: Arc<[u8]>) -> Result<PutHandle> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

    let thread = std::thread::Builder::new()
        .name("libxclip-owner".into())
        .spawn(move || {
            owner::run(selection, payload, |result| {
                // If the host side has already given up on us (e.g. the
                // handshake channel's receiver was dropped on a timeout),
                // there's nothing useful to do with the send failure.
                ready_tx.send(result).ok();
            });
        })
        .map_err(|e| Error::ForkFailure(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(PutHandle { thread: Some(thread) }),
        Ok(Err(e)) => {
            thread.join().ok();
            Err(e)
        }
        Err(_) => {
            // The thread panicked before it could report back.
            thread.join().ok();
            Err(Error::PipeFailure("worker thread exited before signaling readiness".into()))
        }
    }
}
