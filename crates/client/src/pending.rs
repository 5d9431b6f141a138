//! Outstanding-request tables.
//!
//! Responses are matched back to requests through oneshot channels rather
//! than registered callbacks: the requester keeps the receiver, the
//! dispatch loop completes the sender. Registrations are single-shot; a
//! retry under the same echo code simply re-registers.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

/// Echo-code-keyed table for request kinds that multiplex.
pub struct PendingTable<T> {
    entries: Mutex<HashMap<u32, oneshot::Sender<T>>>,
}

impl<T> Default for PendingTable<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> PendingTable<T> {
    /// Registers interest in `echo_code`, displacing any previous
    /// registration under the same code.
    pub fn register(&self, echo_code: u32) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.entries.lock().unwrap().insert(echo_code, tx);
        rx
    }

    /// Routes a response to its requester. Returns false when nothing was
    /// waiting (or the requester gave up).
    pub fn complete(&self, echo_code: u32, value: T) -> bool {
        match self.entries.lock().unwrap().remove(&echo_code) {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }
}

/// Single-slot variant for request kinds with at most one outstanding
/// instance (search, backup, token and email requests).
pub struct SingleSlot<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Default for SingleSlot<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> SingleSlot<T> {
    pub fn register(&self) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        *self.slot.lock().unwrap() = Some(tx);
        rx
    }

    pub fn complete(&self, value: T) -> bool {
        match self.slot.lock().unwrap().take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }
}
