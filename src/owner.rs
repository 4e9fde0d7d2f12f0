//! The owner-side event loop: the ICCCM-compliant selection-owner state
//! machine. Answers `TARGETS`, services single-shot and INCR `UTF8_STRING`
//! requests, drives INCR continuation on `PropertyNotify(PropertyDelete)`,
//! and terminates on `SelectionClear`.

use std::sync::Arc;

use log::{trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ChangeWindowAttributesAux, ConnectionExt as _, CreateWindowAux, EventMask,
    PropMode, Property, PropertyNotifyEvent, SelectionNotifyEvent, SelectionRequestEvent, Time,
    Window, WindowClass, SELECTION_NOTIFY_EVENT,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT};

use crate::atoms::{Atoms, Selection};
use crate::chunker::Chunker;
use crate::error::{into_unknown, Result};
use crate::transfer::TransferTable;

/// Connects, creates the scratch window, takes ownership of `selection`,
/// and serves `SelectionRequest`/`PropertyNotify` events against `payload`
/// until the selection is lost.
///
/// `on_ready` is called exactly once, right after ownership has been taken
/// and verified — it's the ready-handshake hook the background worker uses
/// to unblock `put`. If setup fails, `on_ready` is never called and the
/// error is returned directly.
pub(crate) fn run(selection: Selection, payload: Arc<[u8]>, on_ready: impl FnOnce(Result<()>)) {
    match Owner::new(selection, payload) {
        Ok(owner) => {
            on_ready(Ok(()));
            owner.serve_forever();
        }
        Err(e) => on_ready(Err(e)),
    }
}

struct Owner {
    conn: RustConnection,
    window: Window,
    atoms: Atoms,
    selection: Atom,
    /// The server timestamp at which we took ownership, obtained via the
    /// usual ICCCM trick of bumping a property on our own window and
    /// reading the timestamp back off the resulting `PropertyNotify`.
    /// `SelectionRequest`s timestamped earlier than this are stale and
    /// refused, per ICCCM §2.2.
    acquired_time: Time,
    chunker: Chunker,
    payload: Arc<[u8]>,
    transfers: TransferTable,
}

impl Owner {
    fn new(selection: Selection, payload: Arc<[u8]>) -> Result<Self> {
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
        let selection = selection.atom(&atoms)?;

        let acquired_time = capture_server_time(&conn, window, atoms.LIBXCLIP_TIMESTAMP)?;

        conn.set_selection_owner(window, selection, acquired_time).map_err(into_unknown)?;
        conn.flush().map_err(into_unknown)?;

        let owner = conn.get_selection_owner(selection).map_err(into_unknown)?.reply().map_err(into_unknown)?.owner;
        if owner != window {
            return Err(crate::error::Error::SetupFailure(
                "XSetSelectionOwner did not take effect (readback mismatch)".into(),
            ));
        }

        let chunker = Chunker::new(&conn);

        Ok(Self {
            conn,
            window,
            atoms,
            selection,
            acquired_time,
            chunker,
            payload,
            transfers: TransferTable::new(),
        })
    }

    fn serve_forever(mut self) {
        trace!("owner loop: started, chunk_size={}", self.chunker.chunk_size());
        let _guard = crate::common::ScopeGuard::new(|| trace!("owner loop: stopped serving"));
        loop {
            let event = match self.conn.wait_for_event() {
                Ok(event) => event,
                Err(e) => {
                    warn!("owner loop: connection error, exiting: {e}");
                    return;
                }
            };

            match event {
                Event::SelectionClear(event) if event.selection == self.selection => {
                    // ICCCM §2.5 permits in-flight INCR transfers to continue
                    // past SelectionClear; here ownership loss terminates the
                    // loop immediately, matching the source library's `_Exit`
                    // behavior.
                    trace!("owner loop: lost the selection, exiting");
                    return;
                }
                Event::SelectionRequest(event) => {
                    if let Err(e) = self.handle_selection_request(event) {
                        warn!("owner loop: error handling SelectionRequest: {e}");
                    }
                }
                Event::PropertyNotify(event) if event.state == Property::DELETE => {
                    if let Err(e) = self.handle_property_delete(event) {
                        warn!("owner loop: error continuing an INCR transfer: {e}");
                    }
                }
                Event::PropertyNotify(_) => {
                    // PropertyNewValue: not interesting to us.
                }
                other => {
                    trace!("owner loop: discarding unmatched event {other:?}");
                }
            }
        }
    }

    fn handle_selection_request(&mut self, event: SelectionRequestEvent) -> Result<()> {
        if event.time != Time::CURRENT_TIME.into() && event.time < self.acquired_time {
            warn!("owner loop: refusing a SelectionRequest timestamped before we took ownership");
            return self.notify(&event, None, event.target);
        }

        if event.target == self.atoms.TARGETS {
            return self.serve_targets(event);
        }
        if event.target == self.atoms.UTF8_STRING {
            return self.serve_utf8_string(event);
        }

        trace!("owner loop: refusing unsupported target {:?}", event.target);
        self.notify(&event, None, event.target)
    }

    fn serve_targets(&mut self, event: SelectionRequestEvent) -> Result<()> {
        let supported = [self.atoms.TARGETS, self.atoms.UTF8_STRING];
        let wrote = self
            .conn
            .change_property32(
                PropMode::REPLACE,
                event.requestor,
                event.property,
                self.atoms.ATOM,
                &supported,
            )
            .map_err(into_unknown)?
            .check();

        match wrote {
            Ok(()) => self.notify(&event, Some(event.property), self.atoms.TARGETS),
            Err(_) => self.notify(&event, None, self.atoms.TARGETS),
        }
    }

    fn serve_utf8_string(&mut self, event: SelectionRequestEvent) -> Result<()> {
        if self.chunker.is_small(self.payload.len()) {
            let wrote = self
                .conn
                .change_property8(
                    PropMode::REPLACE,
                    event.requestor,
                    event.property,
                    self.atoms.UTF8_STRING,
                    &self.payload,
                )
                .map_err(into_unknown)?
                .check();

            return match wrote {
                Ok(()) => self.notify(&event, Some(event.property), self.atoms.UTF8_STRING),
                Err(_) => self.notify(&event, None, self.atoms.UTF8_STRING),
            };
        }

        // Large payload: advertise INCR and register a transfer record.
        if !self.transfers.insert(event.requestor, event.property) {
            warn!("owner loop: refusing a second concurrent INCR transfer for the same requestor");
            return self.notify(&event, None, self.atoms.UTF8_STRING);
        }

        let lower_bound: i32 = i32::try_from(self.payload.len()).unwrap_or(i32::MAX);
        let wrote = self
            .conn
            .change_property32(
                PropMode::REPLACE,
                event.requestor,
                event.property,
                self.atoms.INCR,
                &[lower_bound as u32],
            )
            .map_err(into_unknown)?
            .check();

        if wrote.is_err() {
            self.transfers.remove(event.requestor);
            return self.notify(&event, None, self.atoms.UTF8_STRING);
        }

        // We need PropertyNotify on the requestor's window to know when it
        // has consumed each chunk.
        self.conn
            .change_window_attributes(
                event.requestor,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
            )
            .map_err(into_unknown)?
            .check()
            .ok();

        self.notify(&event, Some(event.property), self.atoms.UTF8_STRING)
    }

    fn handle_property_delete(&mut self, event: PropertyNotifyEvent) -> Result<()> {
        let Some(record) = self.transfers.find(event.window) else {
            return Ok(());
        };
        if record.property != event.atom {
            return Ok(());
        }

        let chunk = self.chunker.next_chunk(&self.payload, record.bytes_sent).to_vec();
        let property = record.property;

        let wrote = self
            .conn
            .change_property8(PropMode::REPLACE, event.window, property, self.atoms.UTF8_STRING, &chunk)
            .map_err(into_unknown)?
            .check();

        if wrote.is_err() {
            // The requestor's window is gone. Try to notify, then drop the
            // transfer either way.
            let response = SelectionNotifyEvent {
                response_type: SELECTION_NOTIFY_EVENT,
                sequence: 0,
                time: event.time,
                requestor: event.window,
                selection: self.selection,
                target: self.atoms.UTF8_STRING,
                property: AtomEnum::NONE.into(),
            };
            self.conn
                .send_event(false, event.window, EventMask::NO_EVENT, response)
                .and_then(|cookie| cookie.check())
                .ok();
            self.conn.flush().ok();
            self.transfers.remove(event.window);
            return Ok(());
        }

        let finished = chunk.is_empty();
        if finished {
            self.transfers.remove(event.window);
        } else {
            self.transfers.find_mut(event.window).expect("just looked this up").bytes_sent += chunk.len();
        }

        let response = SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: event.time,
            requestor: event.window,
            selection: self.selection,
            target: self.atoms.UTF8_STRING,
            property,
        };
        self.conn.send_event(false, event.window, EventMask::NO_EVENT, response).map_err(into_unknown)?;
        self.conn.flush().map_err(into_unknown)
    }

    fn notify(&self, request: &SelectionRequestEvent, property: Option<Atom>, target: Atom) -> Result<()> {
        let response = SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: request.time,
            requestor: request.requestor,
            selection: request.selection,
            target,
            property: property.unwrap_or(AtomEnum::NONE.into()),
        };
        self.conn
            .send_event(false, request.requestor, EventMask::NO_EVENT, response)
            .map_err(into_unknown)?;
        self.conn.flush().map_err(into_unknown)
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        self.conn.destroy_window(self.window).ok();
        self.conn.flush().ok();
    }
}

/// The standard ICCCM trick for obtaining a real server timestamp before
/// any event has given us one: bump a property on our own window and read
/// the timestamp off the `PropertyNotify` it generates.
fn capture_server_time(conn: &RustConnection, window: Window, scratch: Atom) -> Result<Time> {
    conn.change_property8(PropMode::APPEND, window, scratch, AtomEnum::STRING, &[])
        .map_err(into_unknown)?
        .check()
        .map_err(into_unknown)?;

    loop {
        let event = conn.wait_for_event().map_err(into_unknown)?;
        if let Event::PropertyNotify(event) = event {
            if event.window == window && event.atom == scratch {
                return Ok(event.time);
            }
        }
    }
}
