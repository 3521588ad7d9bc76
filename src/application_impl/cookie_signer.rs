use crate::application_port::SessionError;
use crate::domain_model::CookieKey;
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;

/// Cookie values are `<key>.<hex hmac-sha256(secret, key)>`.
#[derive(Clone)]
pub struct CookieSigner {
    mac: Hmac<Sha256>,
}

impl CookieSigner {
    pub fn new(secret: &str) -> Result<Self, SessionError> {
        if secret.trim().is_empty() {
            return Err(SessionError::Config("session secret is not configured".into()));
        }
        let mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| SessionError::Config(e.to_string()))?;
        Ok(Self { mac })
    }

    pub fn sign(&self, key: &CookieKey) -> String {
        let mut mac = self.mac.clone();
        mac.update(key.as_str().as_bytes());
        format!("{}.{}", key, hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, value: &str) -> Option<CookieKey> {
        let (key, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(key.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(CookieKey(key.to_owned()))
    }
}
