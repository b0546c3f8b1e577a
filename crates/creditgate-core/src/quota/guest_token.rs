//! Tamper-evident guest usage token.
//!
//! Format: `base64url(json{v, period, count}) "." base64url(hmac_sha256(payload))`.
//! The token is advisory input from the client: anything that fails to
//! verify decodes to a fresh zero count instead of an error.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use creditgate_types::models::GuestTokenConfig;
use creditgate_types::{GuestUsage, PeriodKey, TokenError};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: u8 = 1;
const EPHEMERAL_KEY_LEN: usize = 32;

#[derive(Serialize, Deserialize)]
struct TokenPayload {
    v: u8,
    period: PeriodKey,
    count: u32,
}

/// Signs and verifies guest usage tokens with a keyed MAC.
#[derive(Clone)]
pub struct GuestTokenCodec {
    mac: HmacSha256,
}

impl std::fmt::Debug for GuestTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestTokenCodec").finish_non_exhaustive()
    }
}

impl GuestTokenCodec {
    pub fn from_secret(secret: &[u8]) -> Result<Self, TokenError> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| TokenError::Malformed { message: format!("invalid key: {e}") })?;
        Ok(Self { mac })
    }

    /// Random per-process key. Tokens do not survive a restart.
    pub fn ephemeral() -> Result<Self, TokenError> {
        let mut key = [0_u8; EPHEMERAL_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self::from_secret(&key)
    }

    pub fn from_config(config: &GuestTokenConfig) -> Result<Self, TokenError> {
        if config.secret.is_empty() {
            tracing::warn!(
                "guest_token.secret is empty, using an ephemeral key (guest counts reset on restart)"
            );
            return Self::ephemeral();
        }
        Self::from_secret(config.secret.as_bytes())
    }

    fn signature(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    pub fn encode(&self, usage: &GuestUsage) -> Result<String, TokenError> {
        let payload = TokenPayload { v: TOKEN_VERSION, period: usage.period.clone(), count: usage.count };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| TokenError::Malformed { message: e.to_string() })?;

        let encoded = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.signature(&encoded));
        Ok(format!("{encoded}.{signature}"))
    }

    pub fn decode(&self, token: &str) -> Result<GuestUsage, TokenError> {
        let (encoded, signature) = token
            .trim()
            .split_once('.')
            .ok_or_else(|| TokenError::Malformed { message: "missing signature".to_string() })?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| TokenError::Malformed { message: format!("signature: {e}") })?;

        let mut mac = self.mac.clone();
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| TokenError::Malformed { message: format!("payload: {e}") })?;
        let payload: TokenPayload = serde_json::from_slice(&json)
            .map_err(|e| TokenError::Malformed { message: e.to_string() })?;

        if payload.v != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion { version: payload.v });
        }

        Ok(GuestUsage { period: payload.period, count: payload.count })
    }

    /// Usage for `current`. Absent or earlier-period tokens yield a zero count;
    /// invalid tokens are an error.
    pub fn usage_for_period(
        &self,
        token: Option<&str>,
        current: &PeriodKey,
    ) -> Result<GuestUsage, TokenError> {
        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            return Ok(GuestUsage::fresh(current.clone()));
        };

        let usage = self.decode(token)?;
        if usage.period == *current {
            Ok(usage)
        } else {
            tracing::debug!("Guest token from period {} rolled over to {}", usage.period, current);
            Ok(GuestUsage::fresh(current.clone()))
        }
    }

    /// Like [`Self::usage_for_period`] but never fails: rejected tokens are
    /// logged and treated as a fresh count.
    pub fn resolve(&self, token: Option<&str>, current: &PeriodKey) -> GuestUsage {
        self.usage_for_period(token, current).unwrap_or_else(|e| {
            tracing::warn!("Ignoring guest usage token: {}", e);
            GuestUsage::fresh(current.clone())
        })
    }
}
