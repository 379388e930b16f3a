use std::time::Duration;

use tracing::debug;

use crate::errors::FcmError;
use crate::models::*;

const DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Firebase Cloud Messaging Client
///
/// Sends data messages to a single Android registration id and reports
/// canonical ids so callers can rotate stored tokens.
pub struct FcmClient {
    api_key: String,
    endpoint: String,
    http_client: reqwest::Client,
}

impl FcmClient {
    /// Create new FCM client
    ///
    /// # Arguments
    /// * `api_key` - Server API key sent as `Authorization: key=...`
    /// * `timeout` - Upper bound on a single request round trip
    pub fn new(api_key: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            http_client,
        }
    }

    /// Override the gateway URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a data message to a single registration id
    pub async fn send(
        &self,
        registration_id: &str,
        data: &serde_json::Value,
    ) -> Result<FcmSendResult, FcmError> {
        if self.api_key.is_empty() {
            return Err(FcmError::Authentication);
        }

        let message = FcmMessage {
            to: registration_id,
            data,
            priority: Some("high"),
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.api_key))
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FcmError::Timeout
                } else {
                    FcmError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        let fcm_response: FcmApiResponse = response
            .json()
            .await
            .map_err(|e| FcmError::ResponseParse(e.to_string()))?;

        debug!(
            multicast_id = ?fcm_response.multicast_id,
            success = fcm_response.success,
            failure = fcm_response.failure,
            canonical_ids = fcm_response.canonical_ids,
            "FCM response received"
        );

        interpret_response(fcm_response)
    }
}

/// Map a non-2xx HTTP status to an error
pub fn classify_status(status: u16, body: String) -> FcmError {
    match status {
        400 => FcmError::InvalidJson(body),
        401 | 403 => FcmError::Authentication,
        500 => FcmError::InternalServerError,
        502..=599 => FcmError::Unavailable,
        _ => FcmError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

/// Extract the single-recipient result from a 200 response
pub fn interpret_response(response: FcmApiResponse) -> Result<FcmSendResult, FcmError> {
    let entry = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| FcmError::ResponseParse("response contained no results".to_string()))?;

    if let Some(code) = entry.error {
        return Err(FcmError::from_code(&code));
    }

    Ok(FcmSendResult {
        message_id: entry.message_id.unwrap_or_default(),
        canonical_id: entry.registration_id.filter(|id| !id.is_empty()),
    })
}
