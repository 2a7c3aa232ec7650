use std::net::IpAddr;

use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::response::status::Created;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::{Shutdown, State};
use tokio::select;
use tracing::debug;

use crate::election::Election;
use crate::error::ApiError;
use crate::feed::Table;
use crate::fingerprint::DeviceSignals;
use crate::guard::VoteRejection;
use crate::models::{
    Candidate, CandidateResult, CastVoteRequest, School, SessionInfoResponse,
    VoteAcceptedResponse, VotingStatusResponse,
};
use crate::routes::UserAgent;
use crate::session::VoterSession;

pub const SESSION_COOKIE: &str = "voter_session";

async fn current_session(
    cookies: &CookieJar<'_>,
    election: &Election,
) -> Result<VoterSession, ApiError> {
    let token = cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthorized)?;

    election
        .session(&token)
        .await?
        .ok_or(ApiError::Unauthorized)
}

// Route to start a voter session from the browser's device signals
#[post("/session", format = "json", data = "<signals>")]
pub async fn create_session(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
    user_agent: UserAgent,
    signals: Json<DeviceSignals>,
) -> Result<Json<SessionInfoResponse>, ApiError> {
    let mut signals = signals.into_inner();
    if signals.user_agent.is_none() {
        signals.user_agent = user_agent.0;
    }

    let session = election.start_session(signals).await?;

    let mut cookie = Cookie::new(SESSION_COOKIE, session.token.clone());
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookies.add(cookie);

    Ok(Json(SessionInfoResponse {
        has_voted: session.has_voted,
    }))
}

// Route to get current session info
#[get("/session")]
pub async fn get_session_info(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
) -> Result<Json<SessionInfoResponse>, ApiError> {
    let session = current_session(cookies, election).await?;
    Ok(Json(SessionInfoResponse {
        has_voted: session.has_voted,
    }))
}

#[get("/school")]
pub async fn get_school(election: &State<Election>) -> Result<Json<School>, ApiError> {
    election
        .school()
        .map(Json)
        .ok_or_else(|| VoteRejection::SchoolNotFound.into())
}

// Route to get candidates
#[get("/candidates")]
pub async fn get_candidates(election: &State<Election>) -> Result<Json<Vec<Candidate>>, ApiError> {
    let results = election.store().candidates().await?;
    Ok(Json(results))
}

#[get("/tally")]
pub async fn get_tally(
    election: &State<Election>,
) -> Result<Json<Vec<CandidateResult>>, ApiError> {
    Ok(Json(election.results().await?))
}

// Route to cast a vote
#[post("/vote", format = "json", data = "<vote_request>")]
pub async fn cast_vote(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
    peer: Option<IpAddr>,
    vote_request: Json<CastVoteRequest>,
) -> Result<Created<Json<VoteAcceptedResponse>>, ApiError> {
    let mut session = current_session(cookies, election).await?;

    let receipt = election
        .submit_vote(&mut session, vote_request.candidate_id, peer)
        .await?;

    Ok(Created::new("/api/tally").body(Json(VoteAcceptedResponse {
        candidate_id: receipt.candidate_id,
        school_id: receipt.school_id,
    })))
}

// Route to check status (voting open + session voted)
#[get("/status")]
pub async fn get_vote_status(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
) -> Json<VotingStatusResponse> {
    let voting_open = election
        .school()
        .map(|s| s.is_voting_open)
        .unwrap_or(false);
    let has_voted = current_session(cookies, election)
        .await
        .map(|s| s.has_voted)
        .unwrap_or(false);

    Json(VotingStatusResponse {
        voting_open,
        has_voted,
    })
}

// Live tally and change notifications; the subscription lives as long as the stream
#[get("/events")]
pub fn events(election: &State<Election>, mut end: Shutdown) -> EventStream![] {
    let mut subscription = election.subscribe(&[Table::Schools, Table::Candidates, Table::Votes]);
    let mut tally = election.watch_tally();
    debug!("Event stream opened ({} listeners)", election.feed().subscriber_count());

    EventStream! {
        let current = tally.borrow_and_update().clone();
        yield Event::json(&current).event("tally");

        loop {
            let event = select! {
                changed = tally.changed() => match changed {
                    Ok(()) => {
                        let current = tally.borrow_and_update().clone();
                        Event::json(&current).event("tally")
                    }
                    Err(_) => break,
                },
                change = subscription.next() => match change {
                    Some(change) => Event::json(&change).event("change"),
                    None => break,
                },
                _ = &mut end => break,
            };
            yield event;
        }
    }
}
