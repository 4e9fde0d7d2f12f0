//! The requester side: `get` and `targets`. A single `ConvertSelection`
//! round trip, polled for `SelectionNotify` and, for large payloads, the
//! `PropertyNotify` stream an INCR transfer drives (ICCCM §2.7.2). Grounded
//! on arboard's `read_single` state machine, generalized from a fixed set of
//! clipboard formats to an arbitrary caller-supplied target atom.

use std::time::{Duration, Instant};

use log::trace;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ConnectionExt as _, CreateWindowAux, EventMask, PropertyNotifyEvent, Time, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, NONE};

use crate::atoms::{Atoms, Selection};
use crate::error::{into_unknown, Error, Result};

/// Polling interval while waiting for events with `poll_for_event`, matching
/// the source's busy-wait cadence.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How long to wait for the very first `SelectionNotify` before giving up,
/// when the caller didn't ask for a specific timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

/// How much longer to wait after a `SelectionNotify`/INCR segment arrives,
/// before concluding the owner has stalled.
const INCR_SEGMENT_TIMEOUT: Duration = Duration::from_millis(10);

struct RequesterContext {
    conn: RustConnection,
    window: u32,
    atoms: Atoms,
}

impl RequesterContext {
    fn new() -> Result<Self> {
        let (conn, screen_num) = RustConnection::connect(None).map_err(into_unknown)?;
        let screen = &conn.setup().roots[screen_num];
        let window = conn.generate_id().map_err(into_unknown)?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            screen.root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &CreateWindowAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )
        .map_err(into_unknown)?;
        conn.flush().map_err(into_unknown)?;
        let atoms = Atoms::new(&conn).map_err(into_unknown)?.reply().map_err(into_unknown)?;
        Ok(Self { conn, window, atoms })
    }
}

impl Drop for RequesterContext {
    fn drop(&mut self) {
        self.conn.destroy_window(self.window).ok();
        self.conn.flush().ok();
    }
}

/// Requests `target` on `selection` and returns whatever bytes the owner
/// sends back, assembling INCR segments if the owner uses them.
/// `timeout_ms == 0` falls back to [`DEFAULT_TIMEOUT`].
pub(crate) fn get(selection: &Selection, target: &str, timeout_ms: u64) -> Result<Vec<u8>> {
    let ctx = RequesterContext::new()?;
    let selection_atom = selection.atom(&ctx.atoms)?;
    let target_atom = crate::atoms::intern(&ctx.conn, target)?;
    convert_and_collect(&ctx, selection_atom, target_atom, target_atom, timeout_ms)
}

/// Requests `TARGETS` and decodes the reply as a list of atom names. A
/// `TARGETS` conversion is delivered as an `ATOM`-typed property (the
/// owner writes it with `self.atoms.ATOM`, not `TARGETS`), so the expected
/// property type passed to [`convert_and_collect`] is `ATOM`, distinct from
/// the conversion target.
pub(crate) fn targets(selection: &Selection, timeout_ms: u64) -> Result<Vec<String>> {
    let ctx = RequesterContext::new()?;
    let selection_atom = selection.atom(&ctx.atoms)?;
    let raw = convert_and_collect(&ctx, selection_atom, ctx.atoms.TARGETS, ctx.atoms.ATOM, timeout_ms)?;

    raw.chunks_exact(4)
        .map(|word| {
            let atom = u32::from_ne_bytes(word.try_into().expect("chunks_exact(4)"));
            crate::atoms::name_of(&ctx.conn, atom)
        })
        .collect()
}

/// Issues `ConvertSelection(selection, target, ...)` and collects the
/// reply, which is expected to carry type `reply_type` (equal to `target`
/// for ordinary data conversions, but `ATOM` for a `TARGETS` conversion).
fn convert_and_collect(
    ctx: &RequesterContext,
    selection: x11rb::protocol::xproto::Atom,
    target: x11rb::protocol::xproto::Atom,
    reply_type: x11rb::protocol::xproto::Atom,
    timeout_ms: u64,
) -> Result<Vec<u8>> {
    let owner = ctx.conn.get_selection_owner(selection).map_err(into_unknown)?.reply().map_err(into_unknown)?.owner;
    if owner == NONE {
        return Err(Error::NoOwner);
    }

    ctx.conn
        .delete_property(ctx.window, ctx.atoms.LIBXCLIP_DATA)
        .map_err(into_unknown)?;
    ctx.conn
        .convert_selection(
            ctx.window,
            selection,
            target,
            ctx.atoms.LIBXCLIP_DATA,
            Time::CURRENT_TIME,
        )
        .map_err(into_unknown)?;
    ctx.conn.sync().map_err(into_unknown)?;

    let overall_deadline = if timeout_ms == 0 {
        Instant::now() + DEFAULT_TIMEOUT
    } else {
        Instant::now() + Duration::from_millis(timeout_ms)
    };
    let mut deadline = overall_deadline;

    let mut incr_data = Vec::new();
    let mut using_incr = false;

    while Instant::now() < deadline {
        let event = match ctx.conn.poll_for_event().map_err(into_unknown)? {
            Some(event) => event,
            None => {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
        };

        match event {
            Event::SelectionNotify(event) => {
                trace!("requester: got SelectionNotify");
                if event.property == NONE {
                    return Err(Error::TargetRefused);
                }
                if event.target != target {
                    // The target must echo what we asked for (ICCCM §2.4);
                    // anything else isn't a reply to this request.
                    continue;
                }
                if using_incr {
                    continue;
                }

                let reply = ctx
                    .conn
                    .get_property(true, ctx.window, ctx.atoms.LIBXCLIP_DATA, reply_type, 0, u32::MAX / 4)
                    .map_err(into_unknown)?
                    .reply()
                    .map_err(into_unknown)?;

                if reply.type_ == reply_type {
                    return Ok(reply.value);
                } else if reply.type_ == ctx.atoms.INCR {
                    // Re-read under the INCR type to actually delete the
                    // property and signal the owner we're ready for segments.
                    let incr_reply = ctx
                        .conn
                        .get_property(
                            true,
                            ctx.window,
                            ctx.atoms.LIBXCLIP_DATA,
                            ctx.atoms.INCR,
                            0,
                            u32::MAX / 4,
                        )
                        .map_err(into_unknown)?
                        .reply()
                        .map_err(into_unknown)?;
                    using_incr = true;
                    if let Some(len) = incr_reply.value32().and_then(|mut v| v.next()) {
                        incr_data.reserve(len as usize);
                    }
                    deadline += INCR_SEGMENT_TIMEOUT;
                } else {
                    return Err(Error::Unknown("selection owner replied with an unrequested type".into()));
                }
            }
            Event::PropertyNotify(event) => {
                if let Some(done) = handle_incr_segment(ctx, reply_type, using_incr, &mut incr_data, event)? {
                    if done {
                        return Ok(incr_data);
                    }
                    deadline = Instant::now() + INCR_SEGMENT_TIMEOUT;
                }
            }
            _ => {}
        }
    }

    Err(Error::Timeout)
}

/// Returns `Some(true)` once the terminating zero-length segment has been
/// consumed, `Some(false)` after an intermediate segment, `None` if the
/// event wasn't one of ours.
fn handle_incr_segment(
    ctx: &RequesterContext,
    reply_type: x11rb::protocol::xproto::Atom,
    using_incr: bool,
    incr_data: &mut Vec<u8>,
    event: PropertyNotifyEvent,
) -> Result<Option<bool>> {
    if !using_incr || event.atom != ctx.atoms.LIBXCLIP_DATA || event.state != x11rb::protocol::xproto::Property::NEW_VALUE {
        return Ok(None);
    }

    let reply = ctx
        .conn
        .get_property(true, event.window, event.atom, reply_type, 0, u32::MAX / 4)
        .map_err(into_unknown)?
        .reply()
        .map_err(into_unknown)?;

    if reply.value_len == 0 {
        return Ok(Some(true));
    }
    incr_data.extend(reply.value);
    Ok(Some(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Requires a live X server; run manually with `DISPLAY` set.
    #[test]
    fn get_on_an_empty_clipboard_times_out_quickly() {
        if std::env::var_os("DISPLAY").is_none() {
            eprintln!("skipping: no DISPLAY");
            return;
        }
        let result = get(&Selection::Clipboard, "NONEXISTENT_TARGET_XYZ", 50);
        assert!(result.is_err());
    }
}
