use std::net::IpAddr;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

/// Prefix of the synthetic address recorded when no real one could be resolved.
pub const FALLBACK_PREFIX: &str = "browser_";

/// Resolves the address recorded next to a vote. Implementations never fail:
/// any problem degrades to [`fallback_address`].
#[rocket::async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve_client_address(&self) -> String;
}

pub fn fallback_address() -> String {
    format!("{FALLBACK_PREFIX}{}", Utc::now().timestamp_millis())
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    ip: Option<String>,
}

/// Asks an external "what is my IP" service, e.g. `https://api.ipify.org?format=json`.
#[derive(Debug, Clone)]
pub struct IpLookup {
    client: reqwest::Client,
    url: String,
}

impl IpLookup {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn lookup(&self) -> Result<String, String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("service answered {}", response.status()));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| format!("malformed payload: {e}"))?;

        let ip = body.ip.ok_or_else(|| "payload has no ip".to_string())?;
        ip.trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| format!("payload ip {:?} is not an address", ip))
    }
}

#[rocket::async_trait]
impl AddressResolver for IpLookup {
    async fn resolve_client_address(&self) -> String {
        match self.lookup().await {
            Ok(ip) => ip,
            Err(reason) => {
                warn!("Could not resolve client address via {}: {}", self.url, reason);
                fallback_address()
            }
        }
    }
}

/// Uses the address of the TCP peer that carried the request.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddress(pub Option<IpAddr>);

#[rocket::async_trait]
impl AddressResolver for PeerAddress {
    async fn resolve_client_address(&self) -> String {
        match self.0 {
            Some(ip) => ip.to_string(),
            None => fallback_address(),
        }
    }
}

/// Which resolver a vote submission uses, chosen by configuration.
#[derive(Debug, Clone)]
pub enum AddressSource {
    Lookup(IpLookup),
    Peer,
}
