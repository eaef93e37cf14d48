//! Per-conversation pending-proposal store.
//!
//! One entry per session id, holding at most one pending proposal plus the
//! intent snapshot it was derived from. `take_pending` reads and clears in a
//! single critical section, so when two confirmations race exactly one of
//! them gets the proposal. Expiry is lazy: expired entries are treated as
//! absent and dropped on the read path; no background sweeper.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hopelink_protocol::{Intent, Proposal, SessionId};

/// A proposal awaiting confirmation, with everything execute mode needs.
#[derive(Debug, Clone)]
pub struct PendingDonation {
    pub user_id: String,
    pub proposal: Proposal,
    pub intent: Intent,
}

#[derive(Debug)]
struct Session {
    pending: PendingDonation,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Store a fresh pending proposal, replacing any previous one for this
    /// session and resetting its TTL.
    pub fn upsert(&self, session_id: &SessionId, pending: PendingDonation) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(
            session_id.clone(),
            Session {
                pending,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Peek at the pending proposal without consuming it.
    pub fn get(&self, session_id: &SessionId) -> Option<PendingDonation> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get(session_id) {
            Some(session) if session.expires_at > Instant::now() => {
                Some(session.pending.clone())
            }
            Some(_) => {
                sessions.remove(session_id);
                None
            }
            None => None,
        }
    }

    /// Atomically take the pending proposal, leaving the session empty.
    ///
    /// Expired entries count as absent. Of any number of concurrent calls
    /// for the same session, at most one returns `Some`.
    pub fn take_pending(&self, session_id: &SessionId) -> Option<PendingDonation> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let session = sessions.remove(session_id)?;
        if session.expires_at > Instant::now() {
            Some(session.pending)
        } else {
            None
        }
    }

    /// Drop a session outright.
    pub fn clear(&self, session_id: &SessionId) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopelink_protocol::{DonationWorkflow, IntentFilters};

    fn pending(user: &str) -> PendingDonation {
        PendingDonation {
            user_id: user.to_string(),
            proposal: Proposal::empty(DonationWorkflow::EducationDonation, 500.0, "plan"),
            intent: Intent {
                workflow: DonationWorkflow::EducationDonation,
                amount: Some(500.0),
                filters: IntentFilters::default(),
                confidence: 0.85,
                needs_clarification: false,
                clarification_question: None,
                raw_message: "donate ₹500".into(),
            },
        }
    }

    #[test]
    fn test_round_trip() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = SessionId::from("s1");
        store.upsert(&id, pending("u1"));
        let taken = store.take_pending(&id).expect("pending proposal");
        assert_eq!(taken.user_id, "u1");
    }

    #[test]
    fn test_take_pending_consumes_the_entry() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = SessionId::from("s1");
        store.upsert(&id, pending("u1"));
        assert!(store.take_pending(&id).is_some());
        assert!(store.take_pending(&id).is_none());
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_expired_entries_read_as_absent() {
        let store = SessionStore::new(Duration::from_secs(0));
        let id = SessionId::from("s1");
        store.upsert(&id, pending("u1"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get(&id).is_none());
        assert!(store.take_pending(&id).is_none());
    }

    #[test]
    fn test_upsert_replaces_and_resets() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = SessionId::from("s1");
        store.upsert(&id, pending("u1"));
        store.upsert(&id, pending("u2"));
        let taken = store.take_pending(&id).expect("pending proposal");
        assert_eq!(taken.user_id, "u2");
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.upsert(&SessionId::from("a"), pending("u1"));
        assert!(store.take_pending(&SessionId::from("b")).is_none());
        assert!(store.take_pending(&SessionId::from("a")).is_some());
    }

    #[test]
    fn test_concurrent_confirms_have_one_winner() {
        use std::sync::Arc;

        let store = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let id = SessionId::from("race");
        store.upsert(&id, pending("u1"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let id = id.clone();
            handles.push(std::thread::spawn(move || {
                store.take_pending(&id).is_some()
            }));
        }
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
