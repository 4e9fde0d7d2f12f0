use crate::atoms::Selection;

/// Options for [`crate::put`]. Reserved for future use; an empty,
/// `Default`-deriving record is valid on its own.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    _reserved: (),
}

/// Options for [`crate::get`] and [`crate::targets`].
#[derive(Debug, Clone)]
pub struct GetOptions {
    /// Which selection to query. Defaults to [`Selection::Clipboard`].
    pub selection: Selection,
    /// The target atom name to request, e.g. `"UTF8_STRING"`. Ignored by
    /// [`crate::targets`], which always asks for `TARGETS`.
    pub target: String,
    /// How long to wait for the owner to respond, in milliseconds. `0`
    /// means wait indefinitely.
    pub timeout_ms: u64,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self { selection: Selection::Clipboard, target: "UTF8_STRING".to_owned(), timeout_ms: 0 }
    }
}

/// Fills `options` with the default selection/target/timeout
/// (`selection=CLIPBOARD`, `target=UTF8_STRING`, `timeout_ms=0` meaning "no
/// timeout"). Equivalent to `*options = GetOptions::default()`; kept as a
/// free function for fidelity to the library's C heritage.
pub fn getopts_init(options: &mut GetOptions) {
    *options = GetOptions::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getopts_init_fills_documented_defaults() {
        let mut opts = GetOptions { selection: Selection::Primary, target: "PNG".into(), timeout_ms: 500 };
        getopts_init(&mut opts);
        assert_eq!(opts.selection, Selection::Clipboard);
        assert_eq!(opts.target, "UTF8_STRING");
        assert_eq!(opts.timeout_ms, 0);
    }
}
