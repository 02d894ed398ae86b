//! Broadcasting adapter bridging an application's event bus to the
//! server API.
//!
//! Two operations mirror the two sides of the pub/sub contract:
//! [`Broadcaster::authorize`] answers a client's subscription-
//! authorization request with signed credentials (or 403 entries), and
//! [`Broadcaster::publish_event`] delivers an application event to a set
//! of channels and reconciles the batched per-channel outcome.
//!
//! Whether a user may access a channel is the host application's
//! decision: register a guard with [`Broadcaster::on_access`]. The
//! default guard denies everything.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::api::{ApiClient, RpcOutcome};
use crate::channel::Channel;
use crate::errors::Error;
use crate::token::{ConnectionClaims, SubscriptionClaims};

/// A client's subscription-authorization request, as forwarded by the
/// host application.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    /// Authenticated user id; `None` fails the whole request with
    /// [`Error::Unauthorized`].
    pub user: Option<String>,
    /// Connection id assigned to the client by the server.
    pub client: String,
    /// Channel names the client wants to subscribe to, wire convention.
    pub channels: Vec<String>,
}

/// Outcome of an access guard consultation.
#[derive(Debug, Clone)]
pub enum Access {
    Denied,
    Granted(Grant),
}

/// Details a guard may attach to a granted channel.
#[derive(Debug, Clone, Default)]
pub struct Grant {
    /// Overrides the token subject; defaults to the request's client id.
    pub user: Option<String>,
    /// Metadata embedded in the token and echoed in the response.
    pub info: Option<Value>,
    /// Token lifetime in seconds; tokens never expire when absent.
    pub expire_seconds: Option<u64>,
}

impl Grant {
    /// A grant with no overrides.
    pub fn new() -> Self {
        Grant::default()
    }
}

/// Function type for channel access guards.
///
/// Called once per requested channel with the bare channel name. An
/// [`Error::AccessDenied`] return means denied, same as
/// [`Access::Denied`]; any other error is fatal and propagates out of
/// `authorize` unmodified.
pub type AccessFn = Arc<
    dyn Fn(AuthRequest, String) -> Pin<Box<dyn Future<Output = Result<Access, Error>> + Send>>
        + Send
        + Sync,
>;

/// Wrapper for access guard functions.
///
/// The default guard denies every channel, so an adapter without a
/// registered guard issues no credentials.
#[derive(Clone)]
pub struct AccessFnWrapper(pub AccessFn);

impl Default for AccessFnWrapper {
    fn default() -> Self {
        fn deny_all(
            _request: AuthRequest,
            _channel: String,
        ) -> Pin<Box<dyn Future<Output = Result<Access, Error>> + Send>> {
            Box::pin(async { Ok(Access::Denied) })
        }

        Self(Arc::new(deny_all))
    }
}

/// Authorization result for one public channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ChannelAuth {
    Granted { sign: String, info: Value },
    Denied { status: u16 },
}

/// Authorization result for one private channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SubscriptionAuth {
    Granted {
        channel: String,
        token: String,
        info: Value,
    },
    Denied {
        status: u16,
    },
}

/// Reply envelope for [`Broadcaster::authorize`].
///
/// Public and private results have different wire shapes and are never
/// mixed: as soon as at least one private channel was requested, the
/// reply is the `channels` list of private results.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AuthReply {
    /// Per-channel map, keyed by the raw requested name, in request
    /// order.
    Connections(IndexMap<String, ChannelAuth>),
    /// Ordered list of private-channel results.
    Subscriptions { channels: Vec<SubscriptionAuth> },
}

/// The component the application broadcasting layer talks to.
///
/// Cheap to clone; clones share the underlying API client and the
/// registered access guard.
#[derive(Clone)]
pub struct Broadcaster {
    client: ApiClient,
    verify_access: AccessFnWrapper,
}

impl Broadcaster {
    pub fn new(client: ApiClient) -> Self {
        Broadcaster {
            client,
            verify_access: AccessFnWrapper::default(),
        }
    }

    /// Returns the underlying API client.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Registers the channel access guard.
    ///
    /// The guard receives the request and the bare channel name (marker
    /// and namespace stripped).
    pub fn on_access<Fut>(
        &mut self,
        f: impl Fn(AuthRequest, String) -> Fut + Send + Sync + 'static,
    ) where
        Fut: Future<Output = Result<Access, Error>> + Send + 'static,
    {
        self.verify_access = AccessFnWrapper(Arc::new(move |request, channel| {
            Box::pin(f(request, channel))
                as Pin<Box<dyn Future<Output = Result<Access, Error>> + Send>>
        }));
    }

    /// Authorizes a client's subscription request.
    ///
    /// Fails with [`Error::Unauthorized`] before consulting any guard
    /// when the request carries no user. Per-channel denial is data: a
    /// denied channel produces a `{"status": 403}` entry and never an
    /// error.
    pub async fn authorize(&self, request: &AuthRequest) -> Result<AuthReply, Error> {
        if request.user.is_none() {
            return Err(Error::Unauthorized);
        }

        let namespace = self.client.config().namespace.clone();

        // deduplicate, keeping first-appearance order
        let mut requested: Vec<&String> = Vec::new();
        for raw in &request.channels {
            if !requested.contains(&raw) {
                requested.push(raw);
            }
        }

        let mut connections = IndexMap::new();
        let mut subscriptions = Vec::new();

        for raw in requested {
            let channel = Channel::from_wire(raw, namespace.as_deref());
            let access = match (self.verify_access.0)(
                request.clone(),
                channel.name().to_string(),
            )
            .await
            {
                Ok(access) => access,
                Err(Error::AccessDenied) => Access::Denied,
                Err(err) => return Err(err),
            };

            if channel.is_private() {
                subscriptions.push(self.subscription_auth(&channel, request, access)?);
            } else {
                connections.insert(raw.clone(), self.connection_auth(request, access)?);
            }
        }

        if subscriptions.is_empty() {
            Ok(AuthReply::Connections(connections))
        } else {
            Ok(AuthReply::Subscriptions {
                channels: subscriptions,
            })
        }
    }

    /// Broadcasts an application event to the given channels.
    ///
    /// Injects the event name into the payload as `event`, converts each
    /// channel name from the application's `private-` convention to the
    /// wire form, and delivers via a single batched `broadcast` call.
    /// Any per-channel or top-level server error fails the whole
    /// broadcast with [`Error::Broadcast`] carrying the first message.
    pub async fn publish_event(
        &self,
        channels: &[String],
        event: &str,
        payload: Map<String, Value>,
    ) -> Result<(), Error> {
        let mut data = payload;
        data.insert("event".to_string(), Value::String(event.to_string()));

        let namespace = self.client.config().namespace.clone();
        let wire: Vec<String> = channels
            .iter()
            .map(|raw| Channel::from_app(raw, namespace.as_deref()).wire_name())
            .collect();

        match self.client.broadcast(&wire, Value::Object(data), false).await? {
            RpcOutcome::Success(result) => match first_broadcast_error(&result) {
                Some(message) => Err(Error::Broadcast(message)),
                None => Ok(()),
            },
            RpcOutcome::Failure(failure) => Err(Error::Broadcast(failure.error)),
        }
    }

    fn connection_auth(
        &self,
        request: &AuthRequest,
        access: Access,
    ) -> Result<ChannelAuth, Error> {
        let grant = match access {
            Access::Denied => return Ok(ChannelAuth::Denied { status: 403 }),
            Access::Granted(grant) => grant,
        };

        let subject = grant.user.unwrap_or_else(|| request.client.clone());
        let mut claims = ConnectionClaims::new(subject);
        if let Some(info) = &grant.info {
            claims = claims.with_info(info.clone());
        }
        if let Some(seconds) = grant.expire_seconds {
            claims = claims.expires_in(seconds);
        }

        Ok(ChannelAuth::Granted {
            sign: self.client.connection_token(&claims)?,
            info: grant.info.unwrap_or_else(|| json!({})),
        })
    }

    fn subscription_auth(
        &self,
        channel: &Channel,
        request: &AuthRequest,
        access: Access,
    ) -> Result<SubscriptionAuth, Error> {
        let grant = match access {
            Access::Denied => return Ok(SubscriptionAuth::Denied { status: 403 }),
            Access::Granted(grant) => grant,
        };

        let wire_name = channel.wire_name();
        let mut claims = SubscriptionClaims::new(wire_name.clone(), request.client.clone());
        if let Some(info) = &grant.info {
            claims = claims.with_info(info.clone());
        }
        if let Some(seconds) = grant.expire_seconds {
            claims = claims.expires_in(seconds);
        }

        Ok(SubscriptionAuth::Granted {
            channel: wire_name,
            token: self.client.subscription_token(&claims)?,
            info: grant.info.unwrap_or_else(|| json!({})),
        })
    }
}

/// Scans a broadcast response for the first reported error.
///
/// The batched `result.responses` sequence is authoritative; a bare
/// top-level `error` field is the legacy single-error shape kept as a
/// fallback. No recognized error at either level means success.
fn first_broadcast_error(result: &Value) -> Option<String> {
    if let Some(responses) = result
        .pointer("/result/responses")
        .and_then(Value::as_array)
    {
        for entry in responses {
            if let Some(error) = entry.get("error") {
                return Some(error_message(error));
            }
        }
    }

    result.get("error").map(error_message)
}

fn error_message(error: &Value) -> String {
    if let Some(message) = error.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    match error.as_str() {
        Some(message) => message.to_string(),
        None => error.to_string(),
    }
}
