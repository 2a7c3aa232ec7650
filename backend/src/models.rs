use chrono::NaiveDateTime;
use rocket::serde::{Deserialize, Serialize};
use rocket_db_pools::diesel::prelude::*;

use crate::schema::{admin_sessions, candidates, schools, voter_sessions, votes};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = schools)]
pub struct School {
    pub id: i32,
    pub name: String,
    pub logo_url: Option<String>,
    pub election_title: String,
    pub election_description: String,
    pub is_voting_open: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schools)]
pub struct NewSchool {
    pub name: String,
    pub logo_url: Option<String>,
    pub election_title: String,
    pub election_description: String,
    pub is_voting_open: bool,
}

/// Settings form submitted from the admin dashboard. Every field is written,
/// so an absent logo clears the stored one.
#[derive(Debug, Clone, Deserialize, AsChangeset)]
#[diesel(table_name = schools, treat_none_as_null = true)]
pub struct SchoolSettings {
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub election_title: String,
    #[serde(default)]
    pub election_description: String,
    pub is_voting_open: bool,
}

#[derive(Debug, Clone, Copy, AsChangeset)]
#[diesel(table_name = schools)]
pub struct VotingWindow {
    pub is_voting_open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = candidates)]
pub struct Candidate {
    pub id: i32,
    pub school_id: i32,
    pub name: String,
    pub candidate_number: i32,
    pub photo_url: Option<String>,
    pub vision: String,
    pub mission: String,
    pub class_grade: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = candidates)]
pub struct NewCandidate {
    pub school_id: i32,
    pub name: String,
    pub candidate_number: i32,
    pub photo_url: Option<String>,
    pub vision: String,
    pub mission: String,
    pub class_grade: String,
}

/// Candidate create/edit form. The owning school is never taken from the client.
#[derive(Debug, Clone, Deserialize, AsChangeset)]
#[diesel(table_name = candidates, treat_none_as_null = true)]
pub struct CandidateForm {
    pub name: String,
    pub candidate_number: i32,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub vision: String,
    #[serde(default)]
    pub mission: String,
    #[serde(default)]
    pub class_grade: String,
}

impl CandidateForm {
    pub fn for_school(self, school_id: i32) -> NewCandidate {
        NewCandidate {
            school_id,
            name: self.name,
            candidate_number: self.candidate_number,
            photo_url: self.photo_url,
            vision: self.vision,
            mission: self.mission,
            class_grade: self.class_grade,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = votes)]
pub struct NewVote {
    pub candidate_id: i32,
    pub school_id: i32,
    pub voter_ip: String,
    pub voter_fingerprint: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = admin_sessions)]
pub struct NewAdminSession {
    pub session_token: String,
    pub expires_at: Option<NaiveDateTime>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = voter_sessions)]
pub struct StoredVoterSession {
    pub session_token: String,
    pub voter_fingerprint: String,
    pub has_voted: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = voter_sessions)]
pub struct NewVoterSession {
    pub session_token: String,
    pub voter_fingerprint: String,
    pub has_voted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct AdminLoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct CastVoteRequest {
    pub candidate_id: i32,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct VotingWindowRequest {
    pub open: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct SessionInfoResponse {
    pub has_voted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct VotingStatusResponse {
    pub voting_open: bool,
    pub has_voted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct VoteAcceptedResponse {
    pub candidate_id: i32,
    pub school_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct CandidateResult {
    pub candidate_id: i32,
    pub name: String,
    pub candidate_number: i32,
    pub votes: u64,
    pub percentage: u32,
}
