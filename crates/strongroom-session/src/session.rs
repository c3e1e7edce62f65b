//! The per-request session handle.

use std::sync::Arc;

use parking_lot::MutexGuard;
use strongroom_record::SessionRecord;
use strongroom_store::SharedRecord;

use crate::SessionId;

/// What the factory hands to request code: a shared session record plus
/// what this request knows about it.
///
/// The record itself is shared with every other request for the same
/// session; the `new` flag is not. It is `true` only for the request in
/// which the record was created and is never stored.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    record: SharedRecord,
    new: bool,
}

impl Session {
    pub(crate) fn new(id: SessionId, record: SharedRecord, new: bool) -> Self {
        Self { id, record, new }
    }

    /// The session's id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// `true` if the record was created while handling this request.
    pub fn is_new(&self) -> bool {
        self.new
    }

    /// The shared record.
    pub fn record(&self) -> &SharedRecord {
        &self.record
    }

    /// Locks the record for mapping access.
    ///
    /// Keep the guard short-lived: other requests for the same session wait
    /// on it.
    ///
    /// The lock is not reentrant. The helpers below ([`flash`](Self::flash),
    /// [`pop_flash`](Self::pop_flash), [`get_csrf_token`](Self::get_csrf_token),
    /// [`changed`](Self::changed) and the rest) each take it themselves, so
    /// calling one while a guard from `lock()` is alive deadlocks the
    /// thread. While holding a guard, call the same methods on the guard:
    ///
    /// ```rust,ignore
    /// let mut record = session.lock();
    /// record.set("user", "alice")?;
    /// record.flash("Welcome back");   // not `session.flash(..)`
    /// ```
    pub fn lock(&self) -> MutexGuard<'_, SessionRecord> {
        self.record.lock()
    }

    /// `true` if both handles point at the same stored record.
    pub fn same_record(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }

    /// See [`SessionRecord::changed`].
    pub fn changed(&self) {
        self.lock().changed();
    }

    /// See [`SessionRecord::flash`].
    pub fn flash(&self, message: impl Into<String>) {
        self.lock().flash(message);
    }

    /// See [`SessionRecord::flash_to`].
    pub fn flash_to(
        &self,
        queue: &str,
        message: impl Into<String>,
        allow_duplicate: bool,
    ) {
        self.lock().flash_to(queue, message, allow_duplicate);
    }

    /// See [`SessionRecord::pop_flash`].
    pub fn pop_flash(&self, queue: &str) -> Vec<String> {
        self.lock().pop_flash(queue)
    }

    /// See [`SessionRecord::peek_flash`].
    pub fn peek_flash(&self, queue: &str) -> Vec<String> {
        self.lock().peek_flash(queue)
    }

    /// See [`SessionRecord::new_csrf_token`].
    pub fn new_csrf_token(&self) -> String {
        self.lock().new_csrf_token()
    }

    /// See [`SessionRecord::get_csrf_token`].
    pub fn get_csrf_token(&self) -> String {
        self.lock().get_csrf_token()
    }
}
