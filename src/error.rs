use std::fmt;

/// Everything that can go wrong putting data onto, or getting it from, an
/// X11 selection.
///
/// Protocol-level refusals that the ICCCM expects to be expressed on the
/// wire (e.g. a `SelectionRequest` for an unsupported target) never surface
/// here — the requestor sees them as an empty or absent property, not a
/// Rust error. Only failures that prevent a `put`/`get`/`targets` call from
/// doing its job at all are represented.
#[derive(Debug)]
pub enum Error {
    /// Could not create the scratch window, take ownership of the
    /// selection, or verify that ownership was actually granted.
    SetupFailure(String),
    /// Could not spawn the background worker thread that owns the
    /// selection on the host's behalf.
    ForkFailure(String),
    /// The ready-handshake between the host and the worker failed before
    /// the worker could confirm it had taken ownership.
    PipeFailure(String),
    /// `get`: nobody currently owns the requested selection.
    NoOwner,
    /// `get`: the current owner replied with `property = None`, refusing
    /// the requested target.
    TargetRefused,
    /// `get`: the deadline passed before the transfer completed.
    Timeout,
    /// `get`/`targets`: the selection name is not `PRIMARY`, `SECONDARY`,
    /// or `CLIPBOARD`.
    BadSelection,
    /// The worker hit an unrecoverable error (allocation failure, X I/O
    /// error) and exited.
    Fatal(String),
    /// Any other underlying X11 protocol or connection error.
    Unknown(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SetupFailure(s) => write!(f, "failed to set up the selection owner: {s}"),
            Error::ForkFailure(s) => write!(f, "failed to spawn the selection worker: {s}"),
            Error::PipeFailure(s) => write!(f, "ready handshake with the worker failed: {s}"),
            Error::NoOwner => write!(f, "no process currently owns the selection"),
            Error::TargetRefused => write!(f, "the selection owner refused the requested target"),
            Error::Timeout => write!(f, "timed out waiting for the selection owner to reply"),
            Error::BadSelection => write!(f, "not a valid X11 selection (PRIMARY/SECONDARY/CLIPBOARD)"),
            Error::Fatal(s) => write!(f, "fatal worker error: {s}"),
            Error::Unknown(s) => write!(f, "unknown error: {s}"),
        }
    }
}

impl std::error::Error for Error {}

pub(crate) fn into_unknown<E: fmt::Display>(error: E) -> Error {
    Error::Unknown(format!("{error}"))
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
