use std::fs::File;

use a2::{
    Client, ClientConfig, DefaultNotificationBuilder, Endpoint, NotificationBuilder,
    NotificationOptions, Priority,
};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::ApnsConfig;
use crate::errors::{ApnsError, ApnsReason};

/// Recognized notification fields extracted from a JSON payload
///
/// `title`, `message` (or `alert`/`body`), `sound`, `badge` and `category`
/// populate the `aps` dictionary; every other key is forwarded as custom data.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ApnsAlert {
    pub title: Option<String>,
    pub body: Option<String>,
    pub sound: Option<String>,
    pub badge: Option<u32>,
    pub category: Option<String>,
    pub extra: Map<String, Value>,
}

impl ApnsAlert {
    pub fn from_payload(payload: &Value) -> Self {
        let mut fields = match payload {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other.clone());
                map
            }
        };

        let title = fields.remove("title").and_then(value_as_string);
        let body = ["message", "alert", "body"]
            .iter()
            .filter_map(|key| fields.remove(*key).and_then(value_as_string))
            .next();
        let sound = fields.remove("sound").and_then(value_as_string);
        let badge = fields.remove("badge").and_then(|v| match v {
            Value::Number(n) => n.as_u64().map(|b| b as u32),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
        let category = fields.remove("category").and_then(value_as_string);

        Self {
            title,
            body,
            sound,
            badge,
            category,
            extra: fields,
        }
    }
}

fn value_as_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Apple Push Notification Service (APNs) provider
///
/// Holds one HTTP/2 connection; `send` may be called concurrently.
pub struct ApnsPush {
    client: Client,
    topic: Option<String>,
}

impl ApnsPush {
    /// Opens the certificate and establishes the APNs client
    ///
    /// # Returns
    /// `Ok(ApnsPush)` if initialization succeeds, `Err(ApnsError)` if certificate loading fails
    pub fn connect(cfg: &ApnsConfig) -> Result<Self, ApnsError> {
        let mut file = File::open(&cfg.certificate_path)
            .map_err(|e| ApnsError::Certificate(format!("failed to open certificate file: {e}")))?;

        let password = cfg.certificate_passphrase.as_deref().unwrap_or("");

        let endpoint = if cfg.is_production {
            Endpoint::Production
        } else {
            Endpoint::Sandbox
        };

        let client = Client::certificate(&mut file, password, ClientConfig::new(endpoint))
            .map_err(|e| ApnsError::Certificate(format!("failed to initialize APNs client: {e}")))?;

        info!(
            endpoint = cfg.endpoint(),
            topic = ?cfg.bundle_id,
            "Initialized APNs client"
        );

        Ok(Self {
            client,
            topic: cfg.bundle_id.clone(),
        })
    }

    /// Sends one notification to one device token
    pub async fn send(&self, device_token: &str, alert: &ApnsAlert) -> Result<(), ApnsError> {
        let device_token_prefix = device_token.chars().take(8).collect::<String>();

        let mut builder = DefaultNotificationBuilder::new().set_content_available();

        if let Some(title) = alert.title.as_deref() {
            builder = builder.set_title(title);
        }
        if let Some(body) = alert.body.as_deref() {
            builder = builder.set_body(body);
        }
        if let Some(sound) = alert.sound.as_deref() {
            builder = builder.set_sound(sound);
        }
        if let Some(badge) = alert.badge {
            builder = builder.set_badge(badge);
        }
        if let Some(category) = alert.category.as_deref() {
            builder = builder.set_category(category);
        }

        let options = NotificationOptions {
            apns_topic: self.topic.as_deref(),
            apns_priority: Some(Priority::High),
            ..Default::default()
        };

        let mut payload = builder.build(device_token, options);
        for (key, value) in &alert.extra {
            payload
                .add_custom_data(key, value)
                .map_err(|e| ApnsError::Payload(e.to_string()))?;
        }

        match self.client.send(payload).await {
            Ok(response) => {
                debug!(
                    token = %device_token_prefix,
                    apns_id = ?response.apns_id,
                    "APNs notification accepted"
                );
                Ok(())
            }
            Err(a2::Error::ResponseError(response)) => {
                let reason = response
                    .error
                    .as_ref()
                    .map(|body| ApnsReason::from(&body.reason))
                    .unwrap_or(ApnsReason::Unspecified);
                Err(ApnsError::Rejected {
                    status: response.code,
                    reason,
                })
            }
            Err(e) => Err(ApnsError::Connection(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recognized_fields_are_extracted() {
        let alert = ApnsAlert::from_payload(&json!({
            "title": "Hello",
            "message": "World",
            "sound": "default",
            "badge": 3,
            "category": "promo",
            "deep_link": "app://offers"
        }));

        assert_eq!(alert.title.as_deref(), Some("Hello"));
        assert_eq!(alert.body.as_deref(), Some("World"));
        assert_eq!(alert.sound.as_deref(), Some("default"));
        assert_eq!(alert.badge, Some(3));
        assert_eq!(alert.category.as_deref(), Some("promo"));
        assert_eq!(alert.extra.len(), 1);
        assert_eq!(alert.extra["deep_link"], json!("app://offers"));
    }

    #[test]
    fn test_alert_key_is_accepted_as_body() {
        let alert = ApnsAlert::from_payload(&json!({"alert": "Ping", "badge": "7"}));
        assert_eq!(alert.body.as_deref(), Some("Ping"));
        assert_eq!(alert.badge, Some(7));
        assert!(alert.extra.is_empty());
    }

    #[test]
    fn test_non_object_payload_becomes_custom_data() {
        let alert = ApnsAlert::from_payload(&json!("raw"));
        assert_eq!(alert.title, None);
        assert_eq!(alert.extra["data"], json!("raw"));
    }

    #[test]
    fn test_missing_certificate_file() {
        let cfg = ApnsConfig::new("/nonexistent/cert.p12".to_string(), false);
        assert!(matches!(
            ApnsPush::connect(&cfg),
            Err(ApnsError::Certificate(_))
        ));
    }
}
