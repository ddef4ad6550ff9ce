//! Process-local latch enforcing at-most-one concurrent assembly per
//! `(sessionId, querySignature)`.

use pampax_core::SessionId;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LatchKey(SessionId, String);

/// Tracks in-flight `(sessionId, querySignature)` pairs. Callers either
/// wait for the existing run (not implemented here — a queue is a
/// caller-side choice) or fail fast with `try_acquire`.
#[derive(Default)]
pub struct AssemblyLatch {
    inflight: Mutex<HashSet<LatchKey>>,
}

/// RAII guard releasing the latch when an assembly run finishes, even on
/// an early return or panic unwind.
pub struct LatchGuard<'a> {
    latch: &'a AssemblyLatch,
    key: LatchKey,
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.latch.inflight.lock().unwrap().remove(&self.key);
    }
}

impl AssemblyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to acquire the latch for `(session_id, query_signature)`.
    /// Returns `None` if another assembly for the same pair is already
    /// in flight — the caller's choice whether that means "wait" or
    /// "fail fast with E_BUSY".
    pub fn try_acquire(&self, session_id: SessionId, query_signature: &str) -> Option<LatchGuard<'_>> {
        let key = LatchKey(session_id, query_signature.to_string());
        let mut inflight = self.inflight.lock().unwrap();
        if inflight.contains(&key) {
            return None;
        }
        inflight.insert(key.clone());
        Some(LatchGuard { latch: self, key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_key_is_rejected() {
        let latch = AssemblyLatch::new();
        let session = SessionId::now_v7();
        let _guard = latch.try_acquire(session, "sig").unwrap();
        assert!(latch.try_acquire(session, "sig").is_none());
    }

    #[test]
    fn releasing_the_guard_frees_the_latch() {
        let latch = AssemblyLatch::new();
        let session = SessionId::now_v7();
        {
            let _guard = latch.try_acquire(session, "sig").unwrap();
        }
        assert!(latch.try_acquire(session, "sig").is_some());
    }

    #[test]
    fn different_signatures_do_not_collide() {
        let latch = AssemblyLatch::new();
        let session = SessionId::now_v7();
        let _a = latch.try_acquire(session, "sig-a").unwrap();
        assert!(latch.try_acquire(session, "sig-b").is_some());
    }
}
