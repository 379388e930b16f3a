/// Android Push Gateway Client
///
/// This library provides a client for the Firebase Cloud Messaging HTTP
/// endpoint that addresses Android devices by registration id and
/// authenticates with a server API key.
///
/// It handles:
/// - Single-recipient message delivery
/// - Canonical registration id detection (token rotation)
/// - Classification of provider error codes into a closed error enum

pub mod client;
pub mod errors;
pub mod models;

pub use client::FcmClient;
pub use errors::FcmError;
pub use models::FcmSendResult;
