use crate::detect::Detection;
use crate::state::StatusClass;
use crate::url::VariationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal record for one input URL
///
/// Exactly one is produced per task. Successes go to the results sink,
/// failures to the failures sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlResult {
    pub original_url: String,

    /// URL after redirects, for successful fetches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Variation that succeeded, if it was not the original form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation_used: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation_kind: Option<VariationKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    /// Classification of the last attempt, for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_class: Option<StatusClass>,

    /// Network attempts across every form
    pub attempts: u32,

    pub attempted_urls: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<Detection>,

    pub completed_at: DateTime<Utc>,
}
