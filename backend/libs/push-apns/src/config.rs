/// APNs Configuration
#[derive(Debug, Clone)]
pub struct ApnsConfig {
    pub certificate_path: String,
    pub certificate_passphrase: Option<String>,
    /// Sent as `apns-topic`; APNs derives it from the certificate when unset
    pub bundle_id: Option<String>,
    pub is_production: bool,
}

impl ApnsConfig {
    /// Create new APNs configuration
    pub fn new(certificate_path: String, is_production: bool) -> Self {
        Self {
            certificate_path,
            certificate_passphrase: None,
            bundle_id: None,
            is_production,
        }
    }

    /// Set certificate passphrase
    pub fn with_passphrase(mut self, passphrase: String) -> Self {
        self.certificate_passphrase = Some(passphrase);
        self
    }

    pub fn with_bundle_id(mut self, bundle_id: String) -> Self {
        self.bundle_id = Some(bundle_id);
        self
    }

    /// Get APNs API endpoint based on environment
    pub fn endpoint(&self) -> &str {
        if self.is_production {
            "api.push.apple.com"
        } else {
            "api.sandbox.push.apple.com"
        }
    }
}
