use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts an operation as in flight until dropped.
pub(crate) struct Busy<'a>(&'a AtomicUsize);

impl<'a> Busy<'a> {
    pub(crate) fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) fn is_busy(counter: &AtomicUsize) -> bool {
    counter.load(Ordering::SeqCst) > 0
}
