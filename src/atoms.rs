use x11rb::connection::Connection;
use x11rb::protocol::xproto::ConnectionExt as _;

use crate::error::{into_unknown, Error, Result};

x11rb::atom_manager! {
    pub(crate) Atoms: AtomCookies {
        CLIPBOARD,
        PRIMARY,
        SECONDARY,

        TARGETS,
        ATOM,
        INCR,

        UTF8_STRING,

        // A private property on our scratch window, under which the current
        // selection owner writes the data we asked for.
        LIBXCLIP_DATA,
        // A private property the owner bumps on its own scratch window to
        // capture a real server timestamp before it has seen any event.
        LIBXCLIP_TIMESTAMP,
    }
}

/// Which of the three X11 selections an operation targets.
///
/// `PRIMARY`, `SECONDARY`, and `CLIPBOARD` are the only selections this
/// engine is parametric over; anything else is rejected as
/// [`Error::BadSelection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The conventional cut/copy/paste clipboard. This is the default.
    Clipboard,
    /// The selection backing "select text, middle-click to paste".
    Primary,
    /// Rarely used in practice, but valid per ICCCM.
    Secondary,
    /// Any other atom name. Always resolves to [`Error::BadSelection`].
    Other(String),
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Clipboard
    }
}

impl Selection {
    pub(crate) fn atom(&self, atoms: &Atoms) -> Result<x11rb::protocol::xproto::Atom> {
        match self {
            Selection::Clipboard => Ok(atoms.CLIPBOARD),
            Selection::Primary => Ok(atoms.PRIMARY),
            Selection::Secondary => Ok(atoms.SECONDARY),
            Selection::Other(_) => Err(Error::BadSelection),
        }
    }
}

/// Intern an arbitrary atom name on `conn`. Used to resolve the caller's
/// `target` get-option into an `Atom`.
pub(crate) fn intern(conn: &impl Connection, name: &str) -> Result<x11rb::protocol::xproto::Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .map_err(into_unknown)?
        .reply()
        .map_err(into_unknown)?
        .atom)
}

pub(crate) fn name_of(conn: &impl Connection, atom: x11rb::protocol::xproto::Atom) -> Result<String> {
    String::from_utf8(
        conn.get_atom_name(atom).map_err(into_unknown)?.reply().map_err(into_unknown)?.name,
    )
    .map_err(into_unknown)
}
