use std::time::Duration;

use rocket::figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;

use crate::network::{AddressSource, IpLookup};

/// Where a vote's `voter_ip` comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpSource {
    /// The client address Rocket sees, honoring its configured `ip_header`.
    #[default]
    Peer,
    /// The server's own public address from the lookup service. Only
    /// meaningful when voters and server share one egress address.
    Lookup,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(alias = "DATABASE_URL")]
    pub database_url: String,
    #[serde(alias = "ADMIN_PASSWORD_HASH")]
    pub admin_password_hash: String,
    #[serde(default = "default_rocket_port", alias = "ROCKET_PORT")]
    pub rocket_port: u16,
    #[serde(default, alias = "IP_SOURCE")]
    pub ip_source: IpSource,
    #[serde(default = "default_ip_lookup_url", alias = "IP_LOOKUP_URL")]
    pub ip_lookup_url: String,
    #[serde(default = "default_ip_lookup_timeout", alias = "IP_LOOKUP_TIMEOUT_SECS")]
    pub ip_lookup_timeout_secs: u64,
    #[serde(default, alias = "SCHOOL_NAME")]
    pub school_name: Option<String>,
    #[serde(default, alias = "CANDIDATES")]
    pub candidates: Option<String>,
}

fn default_rocket_port() -> u16 {
    8000
}

fn default_ip_lookup_url() -> String {
    "https://api.ipify.org?format=json".to_string()
}

fn default_ip_lookup_timeout() -> u64 {
    5
}

const ENV_KEYS: [&str; 8] = [
    "DATABASE_URL",
    "ADMIN_PASSWORD_HASH",
    "ROCKET_PORT",
    "IP_SOURCE",
    "IP_LOOKUP_URL",
    "IP_LOOKUP_TIMEOUT_SECS",
    "SCHOOL_NAME",
    "CANDIDATES",
];

impl AppConfig {
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("Config.toml"))
            .merge(Toml::file("../Config.toml"))
            .merge(Env::raw().only(&ENV_KEYS))
    }

    pub fn load() -> Result<Self, rocket::figment::Error> {
        Self::figment().extract()
    }

    pub fn address_source(&self) -> Result<AddressSource, reqwest::Error> {
        match self.ip_source {
            IpSource::Lookup => Ok(AddressSource::Lookup(IpLookup::new(
                self.ip_lookup_url.clone(),
                Duration::from_secs(self.ip_lookup_timeout_secs),
            )?)),
            IpSource::Peer => Ok(AddressSource::Peer),
        }
    }

    /// Candidate names to seed, from the comma separated `CANDIDATES` value.
    pub fn seed_candidates(&self) -> Vec<String> {
        self.candidates
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
