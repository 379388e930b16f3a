use serde::{Deserialize, Serialize};

/// Outcome of a successful single-recipient send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FcmSendResult {
    pub message_id: String,
    /// Replacement registration id reported by the provider, if any
    pub canonical_id: Option<String>,
}

/// FCM Message Request
#[derive(Debug, Serialize)]
pub struct FcmMessage<'a> {
    pub to: &'a str,
    pub data: &'a serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<&'a str>,
}

/// FCM API Response
#[derive(Debug, Deserialize)]
pub struct FcmApiResponse {
    #[serde(default)]
    pub multicast_id: Option<i64>,
    #[serde(default)]
    pub success: u32,
    #[serde(default)]
    pub failure: u32,
    #[serde(default)]
    pub canonical_ids: u32,
    #[serde(default)]
    pub results: Vec<FcmResultEntry>,
}

/// Per-recipient response entry
#[derive(Debug, Deserialize)]
pub struct FcmResultEntry {
    pub message_id: Option<String>,
    pub registration_id: Option<String>,
    pub error: Option<String>,
}
