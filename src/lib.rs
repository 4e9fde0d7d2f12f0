//! Put or get data on an X11 selection without running your own event loop.
//!
//! X11 selections are not server-side storage: whichever client last wrote
//! one must stay alive to answer paste requests against it. [`put`] hides
//! that requirement behind a detached background thread that takes
//! ownership of `CLIPBOARD` and answers `SelectionRequest`s — including
//! large payloads chunked over the ICCCM INCR protocol — for as long as the
//! process lives. [`get`] and [`targets`] are the client side of the same
//! protocol: request a conversion, wait for the answer, and reassemble it
//! if the owner streams it incrementally.
//!
//! ```no_run
//! let handle = libxclip::put(b"hello from libxclip".to_vec(), None).unwrap();
//! let pasted = libxclip::get(None).unwrap();
//! assert_eq!(pasted, b"hello from libxclip");
//! drop(handle); // the worker thread keeps running; see `PutHandle`
//! ```

mod atoms;
mod chunker;
mod common;
mod error;
mod options;
mod owner;
mod requester;
mod transfer;
mod worker;

use std::sync::Arc;

pub use atoms::Selection;
pub use error::Error;
pub use options::{GetOptions, PutOptions};
pub use worker::PutHandle;

pub type Result<T> = std::result::Result<T, Error>;

/// Takes ownership of the `CLIPBOARD` selection and serves it with `payload`
/// from a detached background thread, returning once ownership has been
/// verified via the worker's ready handshake. The returned [`PutHandle`]'s
/// thread keeps running after it's dropped; call [`PutHandle::join`] to
/// wait for it.
pub fn put(payload: impl Into<Vec<u8>>, opts: Option<PutOptions>) -> Result<PutHandle> {
    let _opts = opts.unwrap_or_default();
    let payload: Arc<[u8]> = Arc::from(payload.into().into_boxed_slice());
    worker::spawn(Selection::Clipboard, payload).map_err(Into::into)
}

/// Requests `opts.target` (`UTF8_STRING` by default) on `opts.selection`
/// (`CLIPBOARD` by default) and returns the bytes the owner sends back,
/// reassembling an INCR transfer if the owner uses one.
pub fn get(opts: Option<GetOptions>) -> Result<Vec<u8>> {
    let opts = opts.unwrap_or_default();
    requester::get(&opts.selection, &opts.target, opts.timeout_ms).map_err(Into::into)
}

/// Requests the `TARGETS` atom on `opts.selection` and decodes the reply as
/// the list of target names the current owner supports. `opts.target` is
/// ignored.
pub fn targets(opts: Option<GetOptions>) -> Result<Vec<String>> {
    let opts = opts.unwrap_or_default();
    requester::targets(&opts.selection, opts.timeout_ms).map_err(Into::into)
}

/// Fills `opts` with the documented defaults: `selection = CLIPBOARD`,
/// `target = UTF8_STRING`, `timeout_ms = 0` ("no timeout").
pub fn getopts_init(opts: &mut GetOptions) {
    options::getopts_init(opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getopts_init_matches_documented_defaults() {
        let mut opts = GetOptions { selection: Selection::Primary, target: "PNG".into(), timeout_ms: 9 };
        getopts_init(&mut opts);
        assert_eq!(opts.selection, Selection::Clipboard);
        assert_eq!(opts.target, "UTF8_STRING");
        assert_eq!(opts.timeout_ms, 0);
    }

    /// Round-trips a small payload through a live X server. Skipped when
    /// no `DISPLAY` is available (e.g. this CI runner).
    #[test]
    fn put_then_get_round_trips_a_small_payload() {
        if std::env::var_os("DISPLAY").is_none() {
            eprintln!("skipping: no DISPLAY");
            return;
        }
        let handle = put(b"round trip".to_vec(), None).expect("put should succeed");
        std::thread::sleep(std::time::Duration::from_millis(50));
        let got = get(None).expect("get should succeed");
        assert_eq!(got, b"round trip");
        drop(handle);
    }
}
