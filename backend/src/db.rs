// Database connection and initialization

use std::sync::Arc;

use diesel::Connection;
use diesel_async::AsyncMysqlConnection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use rocket::fairing;
use rocket::{Build, Rocket};
use rocket_db_pools::Database;
use rocket_db_pools::diesel::MysqlPool;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::election::Election;
use crate::error::StoreError;
use crate::models::{CandidateForm, NewSchool};
use crate::store::mysql::MysqlStore;

/// Database connection pool for voting
#[derive(Database)]
#[database("voting_db")]
pub struct VotingDB(MysqlPool);

// Embed migrations from the migrations directory
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run pending database migrations
pub async fn run_migrations(rocket: Rocket<Build>, database_url: String) -> fairing::Result {
    // MigrationHarness is synchronous; the wrapper drives the async connection on this thread
    let result: Result<Vec<String>, String> = tokio::task::spawn_blocking(move || {
        let mut conn = AsyncConnectionWrapper::<AsyncMysqlConnection>::establish(&database_url)
            .map_err(|e| format!("Failed to establish connection: {}", e))?;

        let versions = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| format!("Failed to run migrations: {}", e))?
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<String>>();

        Ok(versions)
    })
    .await
    .unwrap_or_else(|e| Err(format!("Migration task panicked: {}", e)));

    match result {
        Ok(versions) => {
            if versions.is_empty() {
                info!("Database is up to date");
            } else {
                info!("Applied {} migration(s): {}", versions.len(), versions.join(", "));
            }
            Ok(rocket)
        }
        Err(e) => {
            error!("Database migration failed: {}", e);
            Err(rocket)
        }
    }
}

/// Builds the [`Election`] over the initialized pool and hands it to Rocket.
pub async fn attach_election(rocket: Rocket<Build>, config: AppConfig) -> fairing::Result {
    let pool = match VotingDB::fetch(&rocket) {
        Some(db) => db.0.clone(),
        None => {
            error!("Voting database pool is not initialized");
            return Err(rocket);
        }
    };

    let address_source = match config.address_source() {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to build IP lookup client: {}", e);
            return Err(rocket);
        }
    };

    let election = Election::new(Arc::new(MysqlStore::new(pool)), address_source);

    if let Err(e) = run_seeding(&election, &config).await {
        error!("Seeding failed: {}", e);
    }

    Ok(rocket.manage(election))
}

/// Seed the school and candidates when their tables are empty
pub async fn run_seeding(election: &Election, config: &AppConfig) -> Result<(), StoreError> {
    let store = election.store();

    let school = match store.first_school().await? {
        Some(school) => school,
        None => {
            let Some(name) = config.school_name.clone() else {
                return Ok(());
            };
            let school = store
                .insert_school(&NewSchool {
                    name,
                    logo_url: None,
                    election_title: "Student Council Election".to_string(),
                    election_description: String::new(),
                    is_voting_open: false,
                })
                .await?;
            info!("Seeded school {}", school.name);
            school
        }
    };

    if !store.candidates().await?.is_empty() {
        return Ok(());
    }

    let names = config.seed_candidates();
    for (number, name) in names.iter().enumerate() {
        let form = CandidateForm {
            name: name.clone(),
            candidate_number: number as i32 + 1,
            photo_url: None,
            vision: String::new(),
            mission: String::new(),
            class_grade: String::new(),
        };
        store.insert_candidate(&form.for_school(school.id)).await?;
    }
    if !names.is_empty() {
        info!("Seeded {} candidates from configuration", names.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::AddressSource;
    use crate::store::memory::MemoryStore;

    fn config(school: Option<&str>, candidates: Option<&str>) -> AppConfig {
        AppConfig {
            database_url: "mysql://unused".into(),
            admin_password_hash: "unused".into(),
            rocket_port: 8000,
            ip_source: Default::default(),
            ip_lookup_url: "http://127.0.0.1:9/".into(),
            ip_lookup_timeout_secs: 1,
            school_name: school.map(str::to_string),
            candidates: candidates.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn seeds_empty_tables_once() {
        let election = Election::new(Arc::new(MemoryStore::new()), AddressSource::Peer);
        let config = config(Some("SMA Negeri 1"), Some("Rina, Budi"));

        run_seeding(&election, &config).await.unwrap();
        run_seeding(&election, &config).await.unwrap();

        let school = election.store().first_school().await.unwrap().unwrap();
        assert_eq!(school.name, "SMA Negeri 1");
        assert!(!school.is_voting_open);

        let candidates = election.store().candidates().await.unwrap();
        let numbered: Vec<_> = candidates
            .iter()
            .map(|c| (c.candidate_number, c.name.as_str()))
            .collect();
        assert_eq!(numbered, [(1, "Rina"), (2, "Budi")]);
    }

    #[tokio::test]
    async fn nothing_to_seed_without_a_school_name() {
        let election = Election::new(Arc::new(MemoryStore::new()), AddressSource::Peer);

        run_seeding(&election, &config(None, Some("Rina"))).await.unwrap();

        assert!(election.store().first_school().await.unwrap().is_none());
        assert!(election.store().candidates().await.unwrap().is_empty());
    }

    #[test]
    fn fingerprint_columns_compare_case_sensitively() {
        let migrations = [
            include_str!("../migrations/2025-07-01-000003_create_votes/up.sql"),
            include_str!("../migrations/2025-07-01-000005_create_voter_sessions/up.sql"),
        ];
        for sql in migrations {
            let column = sql
                .lines()
                .find(|line| line.trim_start().starts_with("voter_fingerprint"))
                .unwrap();
            assert!(column.contains("COLLATE utf8mb4_bin"), "{column}");
        }
    }
}
