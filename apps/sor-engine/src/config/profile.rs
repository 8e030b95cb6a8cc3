//! Execution profile and live-trading confirmation.

use serde::{Deserialize, Serialize};

use super::{env_flag, env_string};

/// Deployment profile. Live tightens the guard pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecProfile {
    /// Paper trading against recorded or simulated fills.
    #[default]
    Paper,
    /// Venue testnets.
    Testnet,
    /// Real money.
    Live,
}

impl ExecProfile {
    /// Parse a profile name; unknown values fall back to paper.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "live" => Self::Live,
            "testnet" => Self::Testnet,
            _ => Self::Paper,
        }
    }

    /// Whether this is the live profile.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Operator confirmation token required before live submissions pass the
/// profile gate.
pub const LIVE_CONFIRM_TOKEN: &str = "I_UNDERSTAND";

/// Profile-scoped configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Active execution profile.
    pub profile: ExecProfile,
    /// Operator confirmation token (`LIVE_CONFIRM`).
    pub live_confirm: Option<String>,
    /// Host readiness attestation (`READINESS_OK`).
    pub readiness_ok: bool,
    /// Boot into HOLD when set (`SAFE_MODE`).
    pub safe_mode: bool,
}

impl ProfileConfig {
    /// Read the profile surface from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            profile: ExecProfile::parse(&env_string("EXEC_PROFILE").unwrap_or_default()),
            live_confirm: env_string("LIVE_CONFIRM"),
            readiness_ok: env_flag("READINESS_OK"),
            safe_mode: env_flag("SAFE_MODE"),
        }
    }

    /// Whether the operator confirmation token is present and exact.
    #[must_use]
    pub fn live_confirmed(&self) -> bool {
        self.live_confirm
            .as_deref()
            .is_some_and(|token| token.trim() == LIVE_CONFIRM_TOKEN)
    }
}
