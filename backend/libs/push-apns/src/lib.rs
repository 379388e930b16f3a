/// APNs Client Library
///
/// This library provides an Apple Push Notification Service (APNs) client
/// for sending push notifications to iOS devices.
///
/// It handles:
/// - Certificate loading and HTTP/2 connection setup
/// - Building notifications from a loosely structured JSON payload
/// - Parsing APNs rejection reasons into a closed error enum
pub mod client;
pub mod config;
pub mod errors;

pub use client::{ApnsAlert, ApnsPush};
pub use config::ApnsConfig;
pub use errors::{ApnsError, ApnsReason};
