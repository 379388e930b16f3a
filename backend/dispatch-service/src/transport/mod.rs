/// Provider transports
///
/// A transport sends one payload to one device token and reports a
/// `DispatchOutcome`. Each implementation owns the table that maps its
/// provider's error codes onto the outcome enum.
mod android;
mod ios;

pub use android::{classify_fcm_error, FcmTransport};
pub use ios::{classify_apns_error, ApnsTransport};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::{ApnsSettings, FcmConfig};
use crate::models::Platform;

/// Result of a single send, consumed immediately by the batch sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered; carries the provider's replacement key when it issued one
    Sent(Option<String>),
    /// Token is permanently unreachable
    InvalidToken,
    /// Payload rejected; indicates a caller bug
    InvalidData,
    /// Missing or rejected credentials
    AuthFailure,
    /// Transient provider problem, including timeouts
    ServerFailure,
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent(None) => "sent",
            DispatchOutcome::Sent(Some(_)) => "sent_rotated",
            DispatchOutcome::InvalidToken => "invalid_token",
            DispatchOutcome::InvalidData => "invalid_data",
            DispatchOutcome::AuthFailure => "auth_failure",
            DispatchOutcome::ServerFailure => "server_failure",
        }
    }
}

/// Bound a provider call; a call that outlives `timeout` is a `ServerFailure`
pub(crate) async fn within<F>(timeout: Duration, provider: &'static str, send: F) -> DispatchOutcome
where
    F: Future<Output = DispatchOutcome>,
{
    match tokio::time::timeout(timeout, send).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(provider, timeout = ?timeout, "Provider send timed out");
            DispatchOutcome::ServerFailure
        }
    }
}

/// Push provider capability; callable concurrently from batch workers
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, device_key: &str, payload: &serde_json::Value) -> DispatchOutcome;
}

/// Builds the transport for a platform on registry cache miss
pub trait TransportFactory: Send + Sync {
    fn create(&self, platform: Platform) -> Arc<dyn PushTransport>;
}

/// Factory for the real FCM and APNs transports
pub struct ProviderTransportFactory {
    fcm: FcmConfig,
    apns: ApnsSettings,
    send_timeout: Duration,
}

impl ProviderTransportFactory {
    pub fn new(fcm: FcmConfig, apns: ApnsSettings, send_timeout: Duration) -> Self {
        Self {
            fcm,
            apns,
            send_timeout,
        }
    }
}

impl TransportFactory for ProviderTransportFactory {
    fn create(&self, platform: Platform) -> Arc<dyn PushTransport> {
        match platform {
            Platform::Android => Arc::new(FcmTransport::new(&self.fcm, self.send_timeout)),
            Platform::Ios => Arc::new(ApnsTransport::new(self.apns.clone(), self.send_timeout)),
        }
    }
}
