//! Best-effort device fingerprinting.
//!
//! The browser reports its raw signals once per session; the fingerprint is
//! the plain concatenation of them. Two devices with the same browser build,
//! screen and timezone collide, and a client that changes any signal gets a
//! new identity. The unique index on `votes.voter_fingerprint` is therefore
//! only as strong as this heuristic.

use serde::{Deserialize, Serialize};

/// Width of the `votes.voter_fingerprint` column.
pub const FINGERPRINT_MAX_LEN: usize = 255;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSignals {
    /// Output of the client's offscreen text render (canvas data URL).
    /// Absent when the client had no drawing surface.
    #[serde(default)]
    pub renderer: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub screen_width: u32,
    #[serde(default)]
    pub screen_height: u32,
    /// Minutes from UTC as reported by the browser (`getTimezoneOffset`).
    #[serde(default)]
    pub timezone_offset: i32,
}

/// Concatenates renderer output, user agent, screen size and timezone
/// offset. Never fails; missing signals contribute an empty string.
pub fn generate_fingerprint(signals: &DeviceSignals) -> String {
    format!(
        "{}{}{}{}{}",
        signals.renderer.as_deref().unwrap_or_default(),
        signals.user_agent.as_deref().unwrap_or_default(),
        signals.screen_width,
        signals.screen_height,
        signals.timezone_offset,
    )
}

/// Cuts a fingerprint to at most [`FINGERPRINT_MAX_LEN`] characters.
pub fn truncate_fingerprint(fingerprint: &str) -> String {
    match fingerprint.char_indices().nth(FINGERPRINT_MAX_LEN) {
        Some((end, _)) => fingerprint[..end].to_string(),
        None => fingerprint.to_string(),
    }
}

/// The value that is persisted and compared against the unique index.
pub fn stored_fingerprint(signals: &DeviceSignals) -> String {
    truncate_fingerprint(&generate_fingerprint(signals))
}
