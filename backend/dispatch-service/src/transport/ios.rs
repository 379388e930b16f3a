use std::time::Duration;

use async_trait::async_trait;
use push_apns::{ApnsAlert, ApnsConfig, ApnsError, ApnsPush, ApnsReason};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use super::{within, DispatchOutcome, PushTransport};
use crate::config::ApnsSettings;

/// iOS transport over APNs
///
/// The connection is established on the first send and reused for the life
/// of the transport. A failed attempt is not cached, so the next send retries
/// the certificate.
pub struct ApnsTransport {
    settings: ApnsSettings,
    connection: OnceCell<ApnsPush>,
    timeout: Duration,
}

impl ApnsTransport {
    pub fn new(settings: ApnsSettings, timeout: Duration) -> Self {
        Self {
            settings,
            connection: OnceCell::new(),
            timeout,
        }
    }

    async fn connection(&self) -> Result<&ApnsPush, ApnsError> {
        self.connection
            .get_or_try_init(|| async {
                let certificate = self.settings.certificate_file.clone().ok_or_else(|| {
                    ApnsError::Certificate("missing APNs certificate".to_string())
                })?;

                let mut cfg = ApnsConfig::new(certificate, !self.settings.sandbox);
                if let Some(passphrase) = &self.settings.certificate_passphrase {
                    cfg = cfg.with_passphrase(passphrase.clone());
                }
                if let Some(bundle_id) = &self.settings.bundle_id {
                    cfg = cfg.with_bundle_id(bundle_id.clone());
                }

                let push = ApnsPush::connect(&cfg)?;
                info!(endpoint = cfg.endpoint(), "APNs connection established");
                Ok::<_, ApnsError>(push)
            })
            .await
    }
}

#[async_trait]
impl PushTransport for ApnsTransport {
    async fn send(&self, device_key: &str, payload: &serde_json::Value) -> DispatchOutcome {
        let connection = match self.connection().await {
            Ok(connection) => connection,
            Err(e) => {
                error!(error = %e, "APNs connection unavailable");
                return classify_apns_error(&e);
            }
        };

        let alert = ApnsAlert::from_payload(payload);
        within(self.timeout, "apns", async {
            match connection.send(device_key, &alert).await {
                // APNs has no canonical id concept
                Ok(()) => DispatchOutcome::Sent(None),
                Err(e) => {
                    let outcome = classify_apns_error(&e);
                    warn!(error = %e, outcome = outcome.label(), "APNs send failed");
                    outcome
                }
            }
        })
        .await
    }
}

pub fn classify_apns_error(error: &ApnsError) -> DispatchOutcome {
    match error {
        ApnsError::Certificate(_) => DispatchOutcome::AuthFailure,
        ApnsError::Payload(_) => DispatchOutcome::InvalidData,
        ApnsError::Connection(_) => DispatchOutcome::ServerFailure,
        ApnsError::Rejected { reason, .. } => match reason {
            ApnsReason::BadCertificate
            | ApnsReason::BadCertificateEnvironment
            | ApnsReason::Forbidden
            | ApnsReason::InvalidProviderToken
            | ApnsReason::ExpiredProviderToken
            | ApnsReason::MissingProviderToken
            | ApnsReason::TooManyProviderTokenUpdates => DispatchOutcome::AuthFailure,

            ApnsReason::BadDeviceToken
            | ApnsReason::MissingDeviceToken
            | ApnsReason::Unregistered
            | ApnsReason::DeviceTokenNotForTopic => DispatchOutcome::InvalidToken,

            ApnsReason::MissingTopic
            | ApnsReason::BadTopic
            | ApnsReason::TopicDisallowed
            | ApnsReason::PayloadEmpty
            | ApnsReason::PayloadTooLarge
            | ApnsReason::BadCollapseId
            | ApnsReason::BadExpirationDate
            | ApnsReason::BadMessageId
            | ApnsReason::BadPriority
            | ApnsReason::BadPath
            | ApnsReason::MethodNotAllowed
            | ApnsReason::DuplicateHeaders => DispatchOutcome::InvalidData,

            ApnsReason::TooManyRequests
            | ApnsReason::InternalServerError
            | ApnsReason::ServiceUnavailable
            | ApnsReason::Shutdown
            | ApnsReason::IdleTimeout
            | ApnsReason::Unspecified => DispatchOutcome::ServerFailure,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(reason: ApnsReason) -> ApnsError {
        ApnsError::Rejected {
            status: 400,
            reason,
        }
    }

    #[test]
    fn test_apns_reason_table() {
        let cases = [
            (ApnsReason::BadCertificate, DispatchOutcome::AuthFailure),
            (ApnsReason::InvalidProviderToken, DispatchOutcome::AuthFailure),
            (ApnsReason::BadDeviceToken, DispatchOutcome::InvalidToken),
            (ApnsReason::MissingDeviceToken, DispatchOutcome::InvalidToken),
            (ApnsReason::Unregistered, DispatchOutcome::InvalidToken),
            (ApnsReason::MissingTopic, DispatchOutcome::InvalidData),
            (ApnsReason::PayloadEmpty, DispatchOutcome::InvalidData),
            (ApnsReason::PayloadTooLarge, DispatchOutcome::InvalidData),
            (ApnsReason::Shutdown, DispatchOutcome::ServerFailure),
            (ApnsReason::ServiceUnavailable, DispatchOutcome::ServerFailure),
            (ApnsReason::Unspecified, DispatchOutcome::ServerFailure),
        ];

        for (reason, expected) in cases {
            assert_eq!(classify_apns_error(&rejected(reason)), expected, "{reason:?}");
        }
    }

    #[test]
    fn test_non_response_errors() {
        assert_eq!(
            classify_apns_error(&ApnsError::Certificate("x".into())),
            DispatchOutcome::AuthFailure
        );
        assert_eq!(
            classify_apns_error(&ApnsError::Connection("reset".into())),
            DispatchOutcome::ServerFailure
        );
    }

    #[tokio::test]
    async fn test_missing_certificate_is_auth_failure_at_send_time() {
        let transport = ApnsTransport::new(ApnsSettings::default(), Duration::from_secs(1));
        let outcome = transport.send("abcdef", &serde_json::json!({"k": "v"})).await;
        assert_eq!(outcome, DispatchOutcome::AuthFailure);
        assert!(transport.connection.get().is_none());
    }
}
