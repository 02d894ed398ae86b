//! Connection and subscription token issuance.
//!
//! Tokens are compact HS256 JWTs: three url-safe base64 segments
//! (header, claims, signature) joined by `.`, with padding stripped.
//! The server validates them with the same HMAC secret, so the output
//! must stay byte-for-byte compatible with standard JWT validators.
//!
//! Signing is a pure function of the claims and the secret; expiry, when
//! requested, is resolved to an absolute epoch timestamp once, at claim
//! construction time. Nothing here re-validates issued tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;

use crate::errors::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize)]
struct Header {
    typ: &'static str,
    alg: &'static str,
}

const HEADER: Header = Header { typ: "JWT", alg: "HS256" };

/// Claims for a connection-level token, authorizing a client's transport
/// connection to the server.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ConnectionClaims {
    /// Subject: the connecting user's id.
    pub sub: String,
    /// Arbitrary metadata attached to the connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    /// Server-side channel subscriptions to establish on connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,
    /// Absolute expiry, epoch seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl ConnectionClaims {
    pub fn new(sub: impl Into<String>) -> Self {
        ConnectionClaims {
            sub: sub.into(),
            ..Default::default()
        }
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }

    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Sets `exp` to now plus `seconds`.
    pub fn expires_in(mut self, seconds: u64) -> Self {
        self.exp = Some(epoch_now() + seconds);
        self
    }
}

/// Claims for a channel-level token, authorizing one specific client to
/// subscribe to one specific private channel.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionClaims {
    /// Wire name of the target channel.
    pub channel: String,
    /// Connection id of the subscribing client.
    pub client: String,
    /// Arbitrary metadata attached to the subscription.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    /// Absolute expiry, epoch seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl SubscriptionClaims {
    pub fn new(channel: impl Into<String>, client: impl Into<String>) -> Self {
        SubscriptionClaims {
            channel: channel.into(),
            client: client.into(),
            info: None,
            exp: None,
        }
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }

    /// Sets `exp` to now plus `seconds`.
    pub fn expires_in(mut self, seconds: u64) -> Self {
        self.exp = Some(epoch_now() + seconds);
        self
    }
}

/// Signs a claims set, producing the three-segment compact token.
///
/// Claims structs serialize in field-declaration order with no
/// whitespace, so the same claims always yield the same token.
pub fn sign(claims: &impl Serialize, secret: &str) -> Result<String, Error> {
    if secret.is_empty() {
        return Err(Error::Configuration(
            "token HMAC secret is not set".to_string(),
        ));
    }

    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&HEADER)?);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header}.{payload}");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| Error::Configuration(err.to_string()))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
