use std::collections::HashSet;

use parking_lot::Mutex;

/// A message id on one platform whose next delete event is our own echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressedId {
    Discord(i64),
    Qq(i64),
}

/// When the relay deletes a mirrored message, the platform fires a delete
/// event for it, which would bounce back and delete the original. Marking
/// the id before deleting lets the echo be swallowed exactly once.
#[derive(Default)]
pub struct SelfDeleteSuppressor {
    inner: Mutex<HashSet<SuppressedId>>,
}

impl SelfDeleteSuppressor {
    pub fn mark(&self, id: SuppressedId) {
        self.inner.lock().insert(id);
    }

    /// Returns true (and clears the mark) if this delete is our own echo.
    pub fn consume(&self, id: SuppressedId) -> bool {
        self.inner.lock().remove(&id)
    }
}
