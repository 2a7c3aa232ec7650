use uuid::Uuid;

use crate::fingerprint::{DeviceSignals, stored_fingerprint};
use crate::models::{NewVoterSession, StoredVoterSession};

/// Per-voter state carried between requests and persisted in
/// `voter_sessions`. `has_voted` starts from a store lookup and is only ever
/// flipped to `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoterSession {
    pub token: String,
    fingerprint: String,
    pub has_voted: bool,
}

impl VoterSession {
    pub fn new(signals: DeviceSignals, has_voted: bool) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            fingerprint: stored_fingerprint(&signals),
            has_voted,
        }
    }

    /// The fingerprint as stored, already truncated to the column length.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn record(&self) -> NewVoterSession {
        NewVoterSession {
            session_token: self.token.clone(),
            voter_fingerprint: self.fingerprint.clone(),
            has_voted: self.has_voted,
        }
    }
}

impl From<StoredVoterSession> for VoterSession {
    fn from(stored: StoredVoterSession) -> Self {
        Self {
            token: stored.session_token,
            fingerprint: stored.voter_fingerprint,
            has_voted: stored.has_voted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FINGERPRINT_MAX_LEN;

    #[test]
    fn tokens_are_unique() {
        let a = VoterSession::new(DeviceSignals::default(), false);
        let b = VoterSession::new(DeviceSignals::default(), false);
        assert_ne!(a.token, b.token);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn record_round_trips_through_the_stored_row() {
        let signals = DeviceSignals {
            renderer: Some("x".repeat(400)),
            ..DeviceSignals::default()
        };
        let session = VoterSession::new(signals, true);
        let record = session.record();
        assert_eq!(record.voter_fingerprint.chars().count(), FINGERPRINT_MAX_LEN);

        let restored = VoterSession::from(StoredVoterSession {
            session_token: record.session_token,
            voter_fingerprint: record.voter_fingerprint,
            has_voted: record.has_voted,
            created_at: chrono::Utc::now().naive_utc(),
        });
        assert_eq!(restored, session);
    }
}
