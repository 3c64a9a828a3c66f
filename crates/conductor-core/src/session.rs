use crate::error::{ConductorError, ConductorResult};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

/// External form of a session identifier: `YYYYMMDD_HH-MM_<uuid-v4>`.
const SESSION_ID_PATTERN: &str = r"^\d{8}_\d{2}-\d{2}_[0-9a-f-]{36}$";

fn session_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(SESSION_ID_PATTERN).expect("session id pattern is valid")
    })
}

/// Identifier of a directory-scoped orchestration run.
///
/// The wall-clock prefix makes session directories sort chronologically;
/// the uuid suffix keeps them unique when two runs start in the same minute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh identifier stamped with the current UTC time.
    pub fn generate() -> Self {
        Self::generate_at(Utc::now(), Uuid::new_v4())
    }

    /// Generates an identifier from explicit parts.
    pub fn generate_at(at: DateTime<Utc>, uuid: Uuid) -> Self {
        Self(format!("{}_{}", at.format("%Y%m%d_%H-%M"), uuid))
    }

    /// Parses and validates the external form.
    pub fn parse(raw: &str) -> ConductorResult<Self> {
        if session_id_regex().is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ConductorError::ValidationFailed {
                artifact: "session_id".to_string(),
                issues: vec![crate::error::ValidationIssue::new(
                    "sessionId",
                    format!("'{raw}' does not match YYYYMMDD_HH-MM_<uuid>"),
                    "bad_format",
                )],
            })
        }
    }

    /// True iff the string matches the external session-id form.
    pub fn is_valid(raw: &str) -> bool {
        session_id_regex().is_match(raw)
    }

    /// The identifier as a path-safe string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sanitises an ISO-8601 timestamp for use in a filename
/// (`:` and `.` replaced with `-`).
pub fn filename_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}
