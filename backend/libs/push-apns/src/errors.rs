use thiserror::Error;

/// Rejection reasons returned by APNs in the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApnsReason {
    BadCertificate,
    BadCertificateEnvironment,
    Forbidden,
    InvalidProviderToken,
    ExpiredProviderToken,
    MissingProviderToken,
    TooManyProviderTokenUpdates,
    BadDeviceToken,
    MissingDeviceToken,
    Unregistered,
    DeviceTokenNotForTopic,
    MissingTopic,
    BadTopic,
    TopicDisallowed,
    PayloadEmpty,
    PayloadTooLarge,
    BadCollapseId,
    BadExpirationDate,
    BadMessageId,
    BadPriority,
    BadPath,
    MethodNotAllowed,
    DuplicateHeaders,
    TooManyRequests,
    InternalServerError,
    ServiceUnavailable,
    Shutdown,
    IdleTimeout,
    /// Error status without a reason body
    Unspecified,
}

impl From<&a2::ErrorReason> for ApnsReason {
    fn from(reason: &a2::ErrorReason) -> Self {
        use a2::ErrorReason as R;

        match reason {
            R::BadCertificate => ApnsReason::BadCertificate,
            R::BadCertificateEnvironment => ApnsReason::BadCertificateEnvironment,
            R::Forbidden => ApnsReason::Forbidden,
            R::InvalidProviderToken => ApnsReason::InvalidProviderToken,
            R::ExpiredProviderToken => ApnsReason::ExpiredProviderToken,
            R::MissingProviderToken => ApnsReason::MissingProviderToken,
            R::TooManyProviderTokenUpdates => ApnsReason::TooManyProviderTokenUpdates,
            R::BadDeviceToken => ApnsReason::BadDeviceToken,
            R::MissingDeviceToken => ApnsReason::MissingDeviceToken,
            R::Unregistered => ApnsReason::Unregistered,
            R::DeviceTokenNotForTopic => ApnsReason::DeviceTokenNotForTopic,
            R::MissingTopic => ApnsReason::MissingTopic,
            R::BadTopic => ApnsReason::BadTopic,
            R::TopicDisallowed => ApnsReason::TopicDisallowed,
            R::PayloadEmpty => ApnsReason::PayloadEmpty,
            R::PayloadTooLarge => ApnsReason::PayloadTooLarge,
            R::BadCollapseId => ApnsReason::BadCollapseId,
            R::BadExpirationDate => ApnsReason::BadExpirationDate,
            R::BadMessageId => ApnsReason::BadMessageId,
            R::BadPriority => ApnsReason::BadPriority,
            R::BadPath => ApnsReason::BadPath,
            R::MethodNotAllowed => ApnsReason::MethodNotAllowed,
            R::DuplicateHeaders => ApnsReason::DuplicateHeaders,
            R::TooManyRequests => ApnsReason::TooManyRequests,
            R::InternalServerError => ApnsReason::InternalServerError,
            R::ServiceUnavailable => ApnsReason::ServiceUnavailable,
            R::Shutdown => ApnsReason::Shutdown,
            R::IdleTimeout => ApnsReason::IdleTimeout,
        }
    }
}

/// Error type for APNs operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApnsError {
    #[error("APNs certificate error: {0}")]
    Certificate(String),

    #[error("APNs rejected notification (HTTP {status}): {reason:?}")]
    Rejected { status: u16, reason: ApnsReason },

    #[error("Failed to build APNs payload: {0}")]
    Payload(String),

    #[error("APNs connection error: {0}")]
    Connection(String),
}
