/// Runs a closure when dropped, regardless of which path out of a function
/// was taken. Used by the owner loop to mark the worker stopped whether it
/// exits via `SelectionClear`, an X I/O error, or a plain `?`.
pub(crate) struct ScopeGuard<F: FnMut()> {
    callback: F,
}

impl<F: FnMut()> ScopeGuard<F> {
    pub(crate) fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnMut()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        (self.callback)()
    }
}
