use std::time::Duration;

use async_trait::async_trait;
use push_fcm::{FcmClient, FcmError};
use tracing::warn;

use super::{within, DispatchOutcome, PushTransport};
use crate::config::FcmConfig;

/// Android transport over the FCM HTTP endpoint
///
/// The HTTP client and API key are fixed at construction and shared by every
/// send. A missing key makes every send report `AuthFailure`; fixing it takes
/// a restart.
pub struct FcmTransport {
    client: FcmClient,
    timeout: Duration,
}

impl FcmTransport {
    pub fn new(cfg: &FcmConfig, timeout: Duration) -> Self {
        let mut client = FcmClient::new(cfg.api_key.clone().unwrap_or_default(), timeout);
        if let Some(endpoint) = &cfg.endpoint {
            client = client.with_endpoint(endpoint.clone());
        }
        Self { client, timeout }
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    async fn send(&self, device_key: &str, payload: &serde_json::Value) -> DispatchOutcome {
        within(self.timeout, "fcm", async {
            match self.client.send(device_key, payload).await {
                Ok(result) => DispatchOutcome::Sent(result.canonical_id),
                Err(e) => {
                    let outcome = classify_fcm_error(&e);
                    warn!(error = %e, outcome = outcome.label(), "FCM send failed");
                    outcome
                }
            }
        })
        .await
    }
}

pub fn classify_fcm_error(error: &FcmError) -> DispatchOutcome {
    match error {
        FcmError::Authentication => DispatchOutcome::AuthFailure,

        FcmError::MissingRegistration
        | FcmError::InvalidRegistration
        | FcmError::NotRegistered => DispatchOutcome::InvalidToken,

        FcmError::InvalidPackageName
        | FcmError::MismatchSenderId
        | FcmError::MessageTooBig
        | FcmError::InvalidDataKey
        | FcmError::InvalidTtl
        | FcmError::InvalidJson(_) => DispatchOutcome::InvalidData,

        FcmError::Timeout
        | FcmError::Unavailable
        | FcmError::InternalServerError
        | FcmError::DeviceMessageRateExceeded
        | FcmError::Request(_)
        | FcmError::ResponseParse(_)
        | FcmError::Unknown(_) => DispatchOutcome::ServerFailure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fcm_error_table() {
        let cases = [
            ("NotRegistered", DispatchOutcome::InvalidToken),
            ("InvalidRegistration", DispatchOutcome::InvalidToken),
            ("MissingRegistration", DispatchOutcome::InvalidToken),
            ("InvalidPackageName", DispatchOutcome::InvalidData),
            ("MismatchSenderId", DispatchOutcome::InvalidData),
            ("MessageTooBig", DispatchOutcome::InvalidData),
            ("InvalidDataKey", DispatchOutcome::InvalidData),
            ("InvalidTtl", DispatchOutcome::InvalidData),
            ("Unavailable", DispatchOutcome::ServerFailure),
            ("InternalServerError", DispatchOutcome::ServerFailure),
            ("DeviceMessageRateExceeded", DispatchOutcome::ServerFailure),
            ("NeverHeardOfIt", DispatchOutcome::ServerFailure),
        ];

        for (code, expected) in cases {
            assert_eq!(
                classify_fcm_error(&FcmError::from_code(code)),
                expected,
                "code {code}"
            );
        }
    }

    #[test]
    fn test_auth_and_timeout() {
        assert_eq!(
            classify_fcm_error(&FcmError::Authentication),
            DispatchOutcome::AuthFailure
        );
        assert_eq!(
            classify_fcm_error(&FcmError::Timeout),
            DispatchOutcome::ServerFailure
        );
    }

    #[tokio::test]
    async fn test_stalled_gateway_is_server_failure() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let cfg = FcmConfig {
            api_key: Some("server-key".to_string()),
            endpoint: Some(format!("http://{addr}/fcm/send")),
        };
        let transport = FcmTransport::new(&cfg, Duration::from_millis(50));
        assert_eq!(transport.client.endpoint(), format!("http://{addr}/fcm/send"));

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            transport.send("token", &serde_json::json!({"k": "v"})),
        )
        .await
        .unwrap();
        assert_eq!(outcome, DispatchOutcome::ServerFailure);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_auth_failure() {
        let transport = FcmTransport::new(&FcmConfig::default(), Duration::from_secs(1));
        let outcome = transport.send("token", &serde_json::json!({"k": "v"})).await;
        assert_eq!(outcome, DispatchOutcome::AuthFailure);
    }
}
