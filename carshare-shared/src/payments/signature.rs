//! HMAC-SHA256 signatures for gateway requests and webhooks
//!
//! Outgoing request:
//!
//! ```text
//! hex(HMAC-SHA256(secret_key, lower(method) + path + salt + timestamp + access_key + secret_key + body))
//! ```
//!
//! Incoming webhook:
//!
//! ```text
//! hex(HMAC-SHA256(secret_key, salt + timestamp + access_key + secret_key + body))
//! ```

use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Gateway API key pair
#[derive(Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    fn mac(&self, parts: &[&[u8]]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");

        for part in parts {
            mac.update(part);
        }
        mac
    }

    /// Signature for an outgoing request; `path` includes the query string
    pub fn sign_request(
        &self,
        method: &str,
        path: &str,
        salt: &str,
        timestamp: &str,
        body: &str,
    ) -> String {
        let method = method.to_lowercase();
        let mac = self.mac(&[
            method.as_bytes(),
            path.as_bytes(),
            salt.as_bytes(),
            timestamp.as_bytes(),
            self.access_key.as_bytes(),
            self.secret_key.as_bytes(),
            body.as_bytes(),
        ]);

        hex::encode(mac.finalize().into_bytes())
    }

    /// Expected signature for a webhook delivery
    pub fn webhook_signature(&self, salt: &str, timestamp: &str, body: &[u8]) -> String {
        hex::encode(self.webhook_mac(salt, timestamp, body).finalize().into_bytes())
    }

    fn webhook_mac(&self, salt: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
        self.mac(&[
            salt.as_bytes(),
            timestamp.as_bytes(),
            self.access_key.as_bytes(),
            self.secret_key.as_bytes(),
            body,
        ])
    }

    /// Checks a webhook signature in constant time
    ///
    /// Anything that is not valid hex is rejected.
    pub fn verify_webhook_signature(
        &self,
        signature: &str,
        salt: &str,
        timestamp: &str,
        body: &[u8],
    ) -> bool {
        let Ok(provided) = hex::decode(signature.trim()) else {
            return false;
        };

        self.webhook_mac(salt, timestamp, body)
            .verify_slice(&provided)
            .is_ok()
    }
}

/// 12 random bytes, hex encoded
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Current Unix time in seconds
pub fn timestamp() -> String {
    Utc::now().timestamp().to_string()
}
