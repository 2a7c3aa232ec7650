// Routes module - organizes all HTTP route handlers

pub mod voting;

use std::convert::Infallible;

use rocket::Request;
use rocket::request::{FromRequest, Outcome};

use crate::error::ApiError;

#[catch(404)]
pub fn not_found(request: &Request<'_>) -> ApiError {
    ApiError::NotFound(format!("no route for {}", request.uri()))
}

#[catch(401)]
pub fn unauthorized() -> ApiError {
    ApiError::Unauthorized
}

/// The `User-Agent` header, if the client sent one.
pub struct UserAgent(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserAgent {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(UserAgent(
            request.headers().get_one("User-Agent").map(str::to_string),
        ))
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Arc;

    use rocket::local::asynchronous::Client;

    use crate::AppState;
    use crate::election::Election;
    use crate::models::{CandidateForm, NewSchool};
    use crate::network::AddressSource;
    use crate::store::ElectionStore;
    use crate::store::memory::MemoryStore;

    pub const ADMIN_PASSWORD: &str = "rahasia-osis";

    pub struct TestApp {
        pub client: Client,
        pub election: Election,
        pub store: Arc<MemoryStore>,
        pub candidates: Vec<i32>,
    }

    /// A running app over an in-memory store with one school and two candidates.
    pub async fn test_app(voting_open: bool) -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let school = store
            .insert_school(&NewSchool {
                name: "SMA Negeri 1".into(),
                logo_url: None,
                election_title: "Pemilihan Ketua OSIS".into(),
                election_description: "Periode 2025/2026".into(),
                is_voting_open: voting_open,
            })
            .await
            .unwrap();

        let mut candidates = Vec::new();
        for (number, name) in [(1, "Rina"), (2, "Budi")] {
            let form = CandidateForm {
                name: name.into(),
                candidate_number: number,
                photo_url: None,
                vision: String::new(),
                mission: String::new(),
                class_grade: "XI".into(),
            };
            let candidate = store.insert_candidate(&form.for_school(school.id)).await.unwrap();
            candidates.push(candidate.id);
        }

        let election = Election::new(store.clone(), AddressSource::Peer);
        election.load_context().await.unwrap();

        let state = AppState {
            admin_password_hash: bcrypt::hash(ADMIN_PASSWORD, 4).unwrap(),
        };
        let rocket = crate::app(rocket::build(), state).manage(election.clone());
        let client = Client::tracked(rocket).await.unwrap();

        TestApp {
            client,
            election,
            store,
            candidates,
        }
    }
}
