//! Duplicate-vote prevention.
//!
//! The checks here are advisory. The unique index on the fingerprint column
//! is what actually serializes concurrent attempts from the same device, so
//! the guard makes exactly one insert attempt and classifies the outcome.

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::models::{NewVote, School};
use crate::network::AddressResolver;
use crate::session::VoterSession;
use crate::store::ElectionStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteRejection {
    #[error("you have already voted")]
    AlreadyVoted,

    #[error("school not found")]
    SchoolNotFound,

    #[error("voting is closed")]
    VotingClosed,

    #[error("candidate or school not found")]
    ReferenceNotFound,

    #[error("{0}")]
    Store(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteReceipt {
    pub candidate_id: i32,
    pub school_id: i32,
    pub voter_ip: String,
}

/// Records one vote for `candidate_id`, or explains why not.
///
/// Preconditions are checked in order and nothing is resolved or written
/// when one fails. On a duplicate fingerprint the session is marked as voted
/// because a vote from this device already exists.
pub async fn submit_vote(
    store: &dyn ElectionStore,
    resolver: &dyn AddressResolver,
    session: &mut VoterSession,
    school: Option<&School>,
    candidate_id: i32,
) -> Result<VoteReceipt, VoteRejection> {
    if session.has_voted {
        return Err(VoteRejection::AlreadyVoted);
    }
    let school = school.ok_or(VoteRejection::SchoolNotFound)?;
    if !school.is_voting_open {
        return Err(VoteRejection::VotingClosed);
    }

    // The fingerprint is derived synchronously, so only the lookup suspends.
    let voter_fingerprint = session.fingerprint().to_string();
    let voter_ip = resolver.resolve_client_address().await;

    let vote = NewVote {
        candidate_id,
        school_id: school.id,
        voter_ip: voter_ip.clone(),
        voter_fingerprint,
        created_at: Utc::now().naive_utc(),
    };

    match store.insert_vote(&vote).await {
        Ok(()) => {
            session.has_voted = true;
            info!("Vote recorded for candidate {} in school {}", candidate_id, school.id);
            Ok(VoteReceipt {
                candidate_id,
                school_id: school.id,
                voter_ip,
            })
        }
        Err(StoreError::UniqueViolation(_)) => {
            session.has_voted = true;
            warn!("Duplicate vote attempt from {}", voter_ip);
            Err(VoteRejection::AlreadyVoted)
        }
        Err(StoreError::ForeignKeyViolation(detail)) => {
            warn!("Vote for missing candidate {}: {}", candidate_id, detail);
            Err(VoteRejection::ReferenceNotFound)
        }
        Err(e) => {
            error!("Error casting vote: {}", e);
            Err(VoteRejection::Store(e.to_string()))
        }
    }
}
