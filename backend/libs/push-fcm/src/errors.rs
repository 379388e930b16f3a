use thiserror::Error;

/// FCM Client Error Types
///
/// Per-recipient error codes follow the names returned by the provider in
/// `results[].error`; transport-level failures are kept separate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FcmError {
    #[error("Missing or rejected FCM API key")]
    Authentication,

    #[error("Registration id missing from request")]
    MissingRegistration,

    #[error("Invalid registration id")]
    InvalidRegistration,

    #[error("Registration id is no longer registered")]
    NotRegistered,

    #[error("Package name does not match the registration")]
    InvalidPackageName,

    #[error("Sender id does not match the registration")]
    MismatchSenderId,

    #[error("Message payload is too big")]
    MessageTooBig,

    #[error("Payload contains a reserved data key")]
    InvalidDataKey,

    #[error("Invalid time to live")]
    InvalidTtl,

    #[error("Request body rejected: {0}")]
    InvalidJson(String),

    #[error("FCM request timed out")]
    Timeout,

    #[error("FCM service unavailable")]
    Unavailable,

    #[error("FCM internal server error")]
    InternalServerError,

    #[error("Message rate exceeded for device")]
    DeviceMessageRateExceeded,

    #[error("FCM send request failed: {0}")]
    Request(String),

    #[error("Failed to parse FCM response: {0}")]
    ResponseParse(String),

    #[error("Unrecognized FCM error: {0}")]
    Unknown(String),
}

impl FcmError {
    /// Map a per-recipient `error` code to its variant.
    pub fn from_code(code: &str) -> Self {
        match code {
            "MissingRegistration" => FcmError::MissingRegistration,
            "InvalidRegistration" => FcmError::InvalidRegistration,
            "NotRegistered" => FcmError::NotRegistered,
            "InvalidPackageName" => FcmError::InvalidPackageName,
            "MismatchSenderId" => FcmError::MismatchSenderId,
            "MessageTooBig" => FcmError::MessageTooBig,
            "InvalidDataKey" => FcmError::InvalidDataKey,
            "InvalidTtl" => FcmError::InvalidTtl,
            "Unavailable" => FcmError::Unavailable,
            "InternalServerError" => FcmError::InternalServerError,
            "DeviceMessageRateExceeded" => FcmError::DeviceMessageRateExceeded,
            other => FcmError::Unknown(other.to_string()),
        }
    }
}
