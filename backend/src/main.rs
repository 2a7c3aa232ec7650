// Main application entry point

#[macro_use]
extern crate rocket;

mod config;
mod db;
mod election;
mod error;
mod feed;
mod fingerprint;
mod guard;
mod models;
mod network;
mod routes;
mod schema;
mod session;
mod store;
mod tally;

use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use rocket_db_pools::Database;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use config::AppConfig;
use db::VotingDB;
use election::Election;
use routes::voting::{admin, client};

pub struct AppState {
    pub admin_password_hash: String,
}

/// Mounts the API and catchers; the [`Election`] is managed separately.
pub fn app(rocket: Rocket<Build>, state: AppState) -> Rocket<Build> {
    rocket
        .manage(state)
        .mount(
            "/api",
            routes![
                client::create_session,
                client::get_session_info,
                client::get_school,
                client::get_candidates,
                client::get_tally,
                client::cast_vote,
                client::get_vote_status,
                client::events,
                admin::admin_login,
                admin::admin_logout,
                admin::admin_check,
                admin::get_school_settings,
                admin::update_school,
                admin::set_voting_status,
                admin::add_candidate,
                admin::edit_candidate,
                admin::remove_candidate,
                admin::get_results,
                admin::get_stats,
            ],
        )
        .register("/", catchers![routes::not_found, routes::unauthorized])
}

#[launch]
fn rocket() -> _ {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Starting with IP source {:?}", config.ip_source);

    let figment = rocket::Config::figment()
        .merge(("port", config.rocket_port))
        .merge((
            "databases.voting_db",
            rocket_db_pools::Config {
                url: config.database_url.clone(),
                min_connections: None,
                max_connections: 1024,
                connect_timeout: 3,
                idle_timeout: None,
                extensions: None,
            },
        ));

    let state = AppState {
        admin_password_hash: config.admin_password_hash.clone(),
    };
    let database_url = config.database_url.clone();

    app(rocket::custom(figment), state)
        .attach(VotingDB::init())
        .attach(AdHoc::try_on_ignite("Database Migrations", move |rocket| {
            db::run_migrations(rocket, database_url)
        }))
        .attach(AdHoc::try_on_ignite("Election", move |rocket| {
            db::attach_election(rocket, config)
        }))
        .attach(AdHoc::on_liftoff("Election Context", |rocket| {
            Box::pin(async move {
                let Some(election) = rocket.state::<Election>() else {
                    error!("Election context is not managed");
                    return;
                };
                if let Err(e) = election.load_context().await {
                    error!("Failed to load election context: {}", e);
                }
                election.spawn_listener();
                info!("Election listener running");
            })
        }))
}
