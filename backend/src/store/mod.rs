//! Data-store seam. The authoritative duplicate-vote check is the unique
//! index behind [`ElectionStore::insert_vote`], not anything held in memory.

#[cfg(test)]
pub mod memory;
pub mod mysql;

use crate::error::StoreError;
use crate::models::{
    Candidate, CandidateForm, NewAdminSession, NewCandidate, NewSchool, NewVote,
    NewVoterSession, School, SchoolSettings, StoredVoterSession, VotingWindow,
};

#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    /// First school row by id. Deployments are expected to hold exactly one.
    async fn first_school(&self) -> Result<Option<School>, StoreError>;

    async fn insert_school(&self, school: &NewSchool) -> Result<School, StoreError>;

    async fn update_school(&self, id: i32, settings: &SchoolSettings)
    -> Result<School, StoreError>;

    async fn set_voting_window(&self, id: i32, window: VotingWindow)
    -> Result<School, StoreError>;

    /// All candidates ordered by candidate number.
    async fn candidates(&self) -> Result<Vec<Candidate>, StoreError>;

    async fn insert_candidate(&self, candidate: &NewCandidate) -> Result<Candidate, StoreError>;

    async fn update_candidate(&self, id: i32, form: &CandidateForm)
    -> Result<Candidate, StoreError>;

    /// Removes the candidate and, through the cascading key, its votes.
    async fn delete_candidate(&self, id: i32) -> Result<(), StoreError>;

    /// Single insert attempt. A repeated fingerprint fails with
    /// [`StoreError::UniqueViolation`], a dangling candidate or school with
    /// [`StoreError::ForeignKeyViolation`].
    async fn insert_vote(&self, vote: &NewVote) -> Result<(), StoreError>;

    /// Candidate id of every stored vote.
    async fn vote_candidate_ids(&self) -> Result<Vec<i32>, StoreError>;

    async fn fingerprint_has_voted(&self, fingerprint: &str) -> Result<bool, StoreError>;

    async fn create_voter_session(&self, session: &NewVoterSession) -> Result<(), StoreError>;

    async fn voter_session(&self, token: &str) -> Result<Option<StoredVoterSession>, StoreError>;

    /// Sets the session's voted flag. There is no way to clear it again.
    async fn mark_voter_session_voted(&self, token: &str) -> Result<(), StoreError>;

    async fn create_admin_session(&self, session: &NewAdminSession) -> Result<(), StoreError>;

    async fn admin_session_exists(&self, token: &str) -> Result<bool, StoreError>;

    async fn delete_admin_session(&self, token: &str) -> Result<(), StoreError>;
}
