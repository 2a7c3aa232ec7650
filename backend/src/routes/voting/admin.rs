use bcrypt::verify;
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;
use crate::election::Election;
use crate::error::{ApiError, StoreError};
use crate::models::{
    AdminLoginRequest, Candidate, CandidateForm, CandidateResult, NewAdminSession, School,
    SchoolSettings, VotingWindowRequest,
};

pub const ADMIN_COOKIE: &str = "admin_auth";

// Helper function to check if admin is authenticated
async fn is_admin_authenticated(cookies: &CookieJar<'_>, election: &Election) -> bool {
    if let Some(cookie) = cookies.get(ADMIN_COOKIE) {
        election
            .store()
            .admin_session_exists(cookie.value())
            .await
            .unwrap_or_else(|e| {
                error!("Error checking admin session: {}", e);
                false
            })
    } else {
        false
    }
}

async fn require_admin(cookies: &CookieJar<'_>, election: &Election) -> Result<(), ApiError> {
    if is_admin_authenticated(cookies, election).await {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

fn candidate_error(error: StoreError) -> ApiError {
    match error {
        StoreError::UniqueViolation(_) => {
            ApiError::Conflict("candidate number already in use".to_string())
        }
        other => other.into(),
    }
}

// Admin login endpoint
#[post("/admin/login", format = "json", data = "<login>")]
pub async fn admin_login(
    election: &State<Election>,
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
    login: Json<AdminLoginRequest>,
) -> Result<Status, ApiError> {
    if !verify(&login.password, &state.admin_password_hash).unwrap_or(false) {
        // Clear any existing invalid cookie
        cookies.remove(Cookie::from(ADMIN_COOKIE));
        return Err(ApiError::Unauthorized);
    }

    let token = Uuid::new_v4().to_string();
    election
        .store()
        .create_admin_session(&NewAdminSession {
            session_token: token.clone(),
            expires_at: None,
            ip_address: None,
        })
        .await?;
    info!("Admin signed in");

    let mut cookie = Cookie::new(ADMIN_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookies.add(cookie);
    Ok(Status::Ok)
}

// Admin logout endpoint
#[post("/admin/logout")]
pub async fn admin_logout(election: &State<Election>, cookies: &CookieJar<'_>) -> Status {
    if let Some(cookie) = cookies.get(ADMIN_COOKIE) {
        if let Err(e) = election.store().delete_admin_session(cookie.value()).await {
            error!("Error deleting admin session: {}", e);
        }
        cookies.remove(Cookie::from(ADMIN_COOKIE));
    }
    Status::Ok
}

// Check if admin is authenticated
#[get("/admin/check")]
pub async fn admin_check(election: &State<Election>, cookies: &CookieJar<'_>) -> Json<bool> {
    Json(is_admin_authenticated(cookies, election).await)
}

#[get("/admin/school")]
pub async fn get_school_settings(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
) -> Result<Json<School>, ApiError> {
    require_admin(cookies, election).await?;
    election
        .school()
        .map(Json)
        .ok_or(StoreError::NotFound.into())
}

#[put("/admin/school", format = "json", data = "<settings>")]
pub async fn update_school(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
    settings: Json<SchoolSettings>,
) -> Result<Json<School>, ApiError> {
    require_admin(cookies, election).await?;
    Ok(Json(election.update_school(&settings).await?))
}

// Admin route to open or close voting
#[post("/admin/status", format = "json", data = "<status_request>")]
pub async fn set_voting_status(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
    status_request: Json<VotingWindowRequest>,
) -> Result<Json<School>, ApiError> {
    require_admin(cookies, election).await?;
    Ok(Json(election.set_voting_open(status_request.open).await?))
}

#[post("/admin/candidates", format = "json", data = "<form>")]
pub async fn add_candidate(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
    form: Json<CandidateForm>,
) -> Result<Created<Json<Candidate>>, ApiError> {
    require_admin(cookies, election).await?;
    let candidate = election
        .add_candidate(form.into_inner())
        .await
        .map_err(candidate_error)?;
    Ok(Created::new(format!("/api/admin/candidates/{}", candidate.id)).body(Json(candidate)))
}

#[put("/admin/candidates/<id>", format = "json", data = "<form>")]
pub async fn edit_candidate(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
    id: i32,
    form: Json<CandidateForm>,
) -> Result<Json<Candidate>, ApiError> {
    require_admin(cookies, election).await?;
    let candidate = election
        .edit_candidate(id, &form)
        .await
        .map_err(candidate_error)?;
    Ok(Json(candidate))
}

// Deleting a candidate also drops the votes cast for them
#[delete("/admin/candidates/<id>")]
pub async fn remove_candidate(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
    id: i32,
) -> Result<Status, ApiError> {
    require_admin(cookies, election).await?;
    election.remove_candidate(id).await?;
    Ok(Status::NoContent)
}

// Route to get voting results
#[get("/admin/results")]
pub async fn get_results(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
) -> Result<Json<Vec<CandidateResult>>, ApiError> {
    require_admin(cookies, election).await?;
    Ok(Json(election.results().await?))
}

// Admin route to get stats
#[get("/admin/stats")]
pub async fn get_stats(
    election: &State<Election>,
    cookies: &CookieJar<'_>,
) -> Result<Json<u64>, ApiError> {
    require_admin(cookies, election).await?;
    Ok(Json(election.tally().total()))
}
