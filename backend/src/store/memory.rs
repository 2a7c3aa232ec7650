//! In-process [`ElectionStore`] with the same unique and foreign-key rules
//! as the MySQL schema.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{NaiveDateTime, Utc};

use super::ElectionStore;
use crate::error::StoreError;
use crate::models::{
    Candidate, CandidateForm, NewAdminSession, NewCandidate, NewSchool, NewVote,
    NewVoterSession, School, SchoolSettings, StoredVoterSession, VotingWindow,
};

#[derive(Default)]
struct Tables {
    schools: Vec<School>,
    candidates: Vec<Candidate>,
    votes: Vec<NewVote>,
    voter_sessions: Vec<StoredVoterSession>,
    admin_sessions: Vec<String>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn school_mut(&mut self, id: i32) -> Result<&mut School, StoreError> {
        self.schools
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn number_taken(&self, school_id: i32, number: i32, except: Option<i32>) -> bool {
        self.candidates.iter().any(|c| {
            c.school_id == school_id && c.candidate_number == number && Some(c.id) != except
        })
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    vote_attempts: AtomicUsize,
    fail_next_vote: Mutex<Option<StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `insert_vote` was called, successful or not.
    pub fn vote_attempts(&self) -> usize {
        self.vote_attempts.load(Ordering::SeqCst)
    }

    /// Makes the next `insert_vote` fail with `error` before touching the table.
    pub fn fail_next_vote(&self, error: StoreError) {
        *self.fail_next_vote.lock().unwrap() = Some(error);
    }

    pub fn stored_votes(&self) -> Vec<NewVote> {
        let tables = self.tables.lock().unwrap();
        tables.votes.clone()
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn first_school(&self) -> Result<Option<School>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.schools.iter().min_by_key(|s| s.id).cloned())
    }

    async fn insert_school(&self, school: &NewSchool) -> Result<School, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let row = School {
            id: tables.next_id(),
            name: school.name.clone(),
            logo_url: school.logo_url.clone(),
            election_title: school.election_title.clone(),
            election_description: school.election_description.clone(),
            is_voting_open: school.is_voting_open,
            created_at: now(),
            updated_at: now(),
        };
        tables.schools.push(row.clone());
        Ok(row)
    }

    async fn update_school(
        &self,
        id: i32,
        settings: &SchoolSettings,
    ) -> Result<School, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let school = tables.school_mut(id)?;
        school.name = settings.name.clone();
        school.logo_url = settings.logo_url.clone();
        school.election_title = settings.election_title.clone();
        school.election_description = settings.election_description.clone();
        school.is_voting_open = settings.is_voting_open;
        school.updated_at = now();
        Ok(school.clone())
    }

    async fn set_voting_window(
        &self,
        id: i32,
        window: VotingWindow,
    ) -> Result<School, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let school = tables.school_mut(id)?;
        school.is_voting_open = window.is_voting_open;
        school.updated_at = now();
        Ok(school.clone())
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let mut all = tables.candidates.clone();
        all.sort_by_key(|c| c.candidate_number);
        Ok(all)
    }

    async fn insert_candidate(&self, candidate: &NewCandidate) -> Result<Candidate, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.schools.iter().any(|s| s.id == candidate.school_id) {
            return Err(StoreError::ForeignKeyViolation("fk_candidates_school".into()));
        }
        if tables.number_taken(candidate.school_id, candidate.candidate_number, None) {
            return Err(StoreError::UniqueViolation("uq_candidates_school_number".into()));
        }
        let row = Candidate {
            id: tables.next_id(),
            school_id: candidate.school_id,
            name: candidate.name.clone(),
            candidate_number: candidate.candidate_number,
            photo_url: candidate.photo_url.clone(),
            vision: candidate.vision.clone(),
            mission: candidate.mission.clone(),
            class_grade: candidate.class_grade.clone(),
            created_at: now(),
            updated_at: now(),
        };
        tables.candidates.push(row.clone());
        Ok(row)
    }

    async fn update_candidate(
        &self,
        id: i32,
        form: &CandidateForm,
    ) -> Result<Candidate, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let school_id = tables
            .candidates
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.school_id)
            .ok_or(StoreError::NotFound)?;
        if tables.number_taken(school_id, form.candidate_number, Some(id)) {
            return Err(StoreError::UniqueViolation("uq_candidates_school_number".into()));
        }
        let candidate = tables
            .candidates
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound)?;
        candidate.name = form.name.clone();
        candidate.candidate_number = form.candidate_number;
        candidate.photo_url = form.photo_url.clone();
        candidate.vision = form.vision.clone();
        candidate.mission = form.mission.clone();
        candidate.class_grade = form.class_grade.clone();
        candidate.updated_at = now();
        Ok(candidate.clone())
    }

    async fn delete_candidate(&self, id: i32) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.candidates.len();
        tables.candidates.retain(|c| c.id != id);
        if tables.candidates.len() == before {
            return Err(StoreError::NotFound);
        }
        tables.votes.retain(|v| v.candidate_id != id);
        Ok(())
    }

    async fn insert_vote(&self, vote: &NewVote) -> Result<(), StoreError> {
        self.vote_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail_next_vote.lock().unwrap().take() {
            return Err(error);
        }

        let mut tables = self.tables.lock().unwrap();
        if tables
            .votes
            .iter()
            .any(|v| v.voter_fingerprint == vote.voter_fingerprint)
        {
            return Err(StoreError::UniqueViolation("uq_votes_fingerprint".into()));
        }
        if !tables.candidates.iter().any(|c| c.id == vote.candidate_id) {
            return Err(StoreError::ForeignKeyViolation("fk_votes_candidate".into()));
        }
        if !tables.schools.iter().any(|s| s.id == vote.school_id) {
            return Err(StoreError::ForeignKeyViolation("fk_votes_school".into()));
        }
        tables.votes.push(vote.clone());
        Ok(())
    }

    async fn vote_candidate_ids(&self) -> Result<Vec<i32>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.votes.iter().map(|v| v.candidate_id).collect())
    }

    async fn fingerprint_has_voted(&self, fingerprint: &str) -> Result<bool, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .votes
            .iter()
            .any(|v| v.voter_fingerprint == fingerprint))
    }

    async fn create_voter_session(&self, session: &NewVoterSession) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .voter_sessions
            .iter()
            .any(|s| s.session_token == session.session_token)
        {
            return Err(StoreError::UniqueViolation("voter_sessions.PRIMARY".into()));
        }
        tables.voter_sessions.push(StoredVoterSession {
            session_token: session.session_token.clone(),
            voter_fingerprint: session.voter_fingerprint.clone(),
            has_voted: session.has_voted,
            created_at: now(),
        });
        Ok(())
    }

    async fn voter_session(&self, token: &str) -> Result<Option<StoredVoterSession>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .voter_sessions
            .iter()
            .find(|s| s.session_token == token)
            .cloned())
    }

    async fn mark_voter_session_voted(&self, token: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(session) = tables
            .voter_sessions
            .iter_mut()
            .find(|s| s.session_token == token)
        {
            session.has_voted = true;
        }
        Ok(())
    }

    async fn create_admin_session(&self, session: &NewAdminSession) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.admin_sessions.push(session.session_token.clone());
        Ok(())
    }

    async fn admin_session_exists(&self, token: &str) -> Result<bool, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.admin_sessions.iter().any(|t| t == token))
    }

    async fn delete_admin_session(&self, token: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.admin_sessions.retain(|t| t != token);
        Ok(())
    }
}
