//! Context type for tracing the origin of command calls

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifies who issued a command and when
///
/// Every call on the command surface carries a Context so that log lines
/// and acknowledgements can be tied back to the request that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier for this call (ULID)
    pub id: String,

    /// Caller label (dashboard, cli, ...), if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// When the call was received
    pub received_at: DateTime<Utc>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
            origin: None,
            received_at: Utc::now(),
        }
    }

    /// Create a context tagged with the caller that issued it
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            ..Self::new()
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
