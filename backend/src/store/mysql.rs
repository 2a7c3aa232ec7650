use diesel::sql_types::Integer;
use rocket_db_pools::diesel::MysqlPool;
use rocket_db_pools::diesel::prelude::*;

use super::ElectionStore;
use crate::error::StoreError;
use crate::models::{
    Candidate, CandidateForm, NewAdminSession, NewCandidate, NewSchool, NewVote,
    NewVoterSession, School, SchoolSettings, StoredVoterSession, VotingWindow,
};
use crate::schema::{admin_sessions, candidates, schools, voter_sessions, votes};

fn unavailable(error: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

/// [`ElectionStore`] over the pooled async MySQL connection managed by Rocket.
#[derive(Clone)]
pub struct MysqlStore {
    pool: MysqlPool,
}

impl MysqlStore {
    pub fn new(pool: MysqlPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl ElectionStore for MysqlStore {
    async fn first_school(&self) -> Result<Option<School>, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let school = schools::table
            .order(schools::id.asc())
            .select(School::as_select())
            .first::<School>(&mut *conn)
            .await
            .optional()?;

        Ok(school)
    }

    async fn insert_school(&self, school: &NewSchool) -> Result<School, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        diesel::insert_into(schools::table)
            .values(school)
            .execute(&mut *conn)
            .await?;

        let id = diesel::select(diesel::dsl::sql::<Integer>("LAST_INSERT_ID()"))
            .get_result::<i32>(&mut *conn)
            .await?;

        let school = schools::table
            .find(id)
            .select(School::as_select())
            .first::<School>(&mut *conn)
            .await?;

        Ok(school)
    }

    async fn update_school(
        &self,
        id: i32,
        settings: &SchoolSettings,
    ) -> Result<School, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        diesel::update(schools::table.find(id))
            .set(settings)
            .execute(&mut *conn)
            .await?;

        let school = schools::table
            .find(id)
            .select(School::as_select())
            .first::<School>(&mut *conn)
            .await?;

        Ok(school)
    }

    async fn set_voting_window(
        &self,
        id: i32,
        window: VotingWindow,
    ) -> Result<School, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        diesel::update(schools::table.find(id))
            .set(&window)
            .execute(&mut *conn)
            .await?;

        let school = schools::table
            .find(id)
            .select(School::as_select())
            .first::<School>(&mut *conn)
            .await?;

        Ok(school)
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let results = candidates::table
            .order(candidates::candidate_number.asc())
            .select(Candidate::as_select())
            .load::<Candidate>(&mut *conn)
            .await?;

        Ok(results)
    }

    async fn insert_candidate(&self, candidate: &NewCandidate) -> Result<Candidate, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        diesel::insert_into(candidates::table)
            .values(candidate)
            .execute(&mut *conn)
            .await?;

        let id = diesel::select(diesel::dsl::sql::<Integer>("LAST_INSERT_ID()"))
            .get_result::<i32>(&mut *conn)
            .await?;

        let candidate = candidates::table
            .find(id)
            .select(Candidate::as_select())
            .first::<Candidate>(&mut *conn)
            .await?;

        Ok(candidate)
    }

    async fn update_candidate(
        &self,
        id: i32,
        form: &CandidateForm,
    ) -> Result<Candidate, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        diesel::update(candidates::table.find(id))
            .set(form)
            .execute(&mut *conn)
            .await?;

        let candidate = candidates::table
            .find(id)
            .select(Candidate::as_select())
            .first::<Candidate>(&mut *conn)
            .await?;

        Ok(candidate)
    }

    async fn delete_candidate(&self, id: i32) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let deleted = diesel::delete(candidates::table.find(id))
            .execute(&mut *conn)
            .await?;

        if deleted == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn insert_vote(&self, vote: &NewVote) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        diesel::insert_into(votes::table)
            .values(vote)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn vote_candidate_ids(&self) -> Result<Vec<i32>, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let ids = votes::table
            .select(votes::candidate_id)
            .load::<i32>(&mut *conn)
            .await?;

        Ok(ids)
    }

    async fn fingerprint_has_voted(&self, fingerprint: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let count: i64 = votes::table
            .filter(votes::voter_fingerprint.eq(fingerprint))
            .count()
            .get_result(&mut *conn)
            .await?;

        Ok(count > 0)
    }

    async fn create_voter_session(&self, session: &NewVoterSession) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        diesel::insert_into(voter_sessions::table)
            .values(session)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn voter_session(&self, token: &str) -> Result<Option<StoredVoterSession>, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let session = voter_sessions::table
            .find(token)
            .select(StoredVoterSession::as_select())
            .first::<StoredVoterSession>(&mut *conn)
            .await
            .optional()?;

        Ok(session)
    }

    async fn mark_voter_session_voted(&self, token: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        diesel::update(voter_sessions::table.find(token))
            .set(voter_sessions::has_voted.eq(true))
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn create_admin_session(&self, session: &NewAdminSession) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        diesel::insert_into(admin_sessions::table)
            .values(session)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn admin_session_exists(&self, token: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let count: i64 = admin_sessions::table
            .find(token)
            .count()
            .get_result(&mut *conn)
            .await?;

        Ok(count > 0)
    }

    async fn delete_admin_session(&self, token: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        diesel::delete(admin_sessions::table.find(token))
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
