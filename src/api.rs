//! HTTP API client for the Centrifugo server.
//!
//! The client speaks the legacy command envelope: every call is a
//! `POST {url}/api` with body `{"method": <name>, "params": <params>}`
//! and an `Authorization: apikey <key>` header. Responses are returned
//! verbatim as [`RpcOutcome::Success`]; client-level HTTP failures
//! (non-2xx status, undecodable body) are captured into
//! [`RpcOutcome::Failure`] rather than raised, so callers always get a
//! value back. The only errors that propagate are configuration problems
//! and connect/timeout failures that survive all configured attempts.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::{Value, json};

use crate::config::Config;
use crate::errors::Error;
use crate::token::{self, ConnectionClaims, SubscriptionClaims};

const API_PATH: &str = "/api";

/// Result of a single API call.
///
/// Created fresh per call and never persisted. A `Failure` is data, not
/// an error: it carries the method, the client-level error message, and
/// the original params so the caller can reconcile or log them.
#[derive(Debug, Clone)]
pub enum RpcOutcome {
    Success(Value),
    Failure(RpcFailure),
}

/// Failure shape synthesized when the transport reports a client-level
/// error.
#[derive(Debug, Clone, Serialize)]
pub struct RpcFailure {
    pub method: String,
    pub error: String,
    pub body: Value,
}

/// Stream position cursor for [`ApiClient::history`].
#[derive(Debug, Clone, Serialize)]
pub struct StreamPosition {
    pub offset: u64,
    pub epoch: String,
}

/// Stateless client for the server HTTP API.
///
/// Cheap to clone; clones share the same connection pool and
/// configuration. Safe to use concurrently, each call is independent.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl ApiClient {
    /// Builds a client from the given configuration.
    ///
    /// TLS options (certificate verification, optional client key) are
    /// applied only when the configured URL scheme is `https`.
    pub fn new(config: Config) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);

        if config.url.starts_with("https://") {
            if !config.tls_verify {
                builder = builder.danger_accept_invalid_certs(true);
            }
            if let Some(path) = &config.ssl_key {
                let pem = std::fs::read(path).map_err(|err| {
                    Error::Configuration(format!(
                        "failed to read ssl key {}: {}",
                        path.display(),
                        err
                    ))
                })?;
                let identity = reqwest::Identity::from_pem(&pem)
                    .map_err(|err| Error::Configuration(err.to_string()))?;
                builder = builder.identity(identity);
            }
        }

        let http = builder
            .build()
            .map_err(|err| Error::Configuration(err.to_string()))?;

        Ok(ApiClient {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sends one command to the server.
    ///
    /// Connect and timeout failures are retried up to `max_tries - 1`
    /// additional times, each attempt bounded by the configured timeout;
    /// dropping the returned future aborts the in-flight attempt and any
    /// remaining retries.
    pub async fn call(&self, method: &str, params: Value) -> Result<RpcOutcome, Error> {
        if self.config.api_key.is_empty() {
            return Err(Error::Configuration("api key is not set".to_string()));
        }

        let body = json!({ "method": method, "params": &params });
        let url = self.endpoint();
        log::trace!("--> {}", body);

        let max_tries = self.config.max_tries.max(1);
        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self
                .http
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, format!("apikey {}", self.config.api_key))
                .json(&body)
                .send()
                .await
            {
                Ok(response) => break response,
                Err(err) if err.is_connect() || err.is_timeout() => {
                    if attempt >= max_tries {
                        return Err(Error::Transport {
                            method: method.to_string(),
                            message: err.to_string(),
                        });
                    }
                    log::debug!("{} attempt {}/{} failed: {}", method, attempt, max_tries, err);
                }
                Err(err) => {
                    log::debug!("{} failed: {}", method, err);
                    return Ok(RpcOutcome::Failure(RpcFailure {
                        method: method.to_string(),
                        error: err.to_string(),
                        body: params,
                    }));
                }
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                return Ok(RpcOutcome::Failure(RpcFailure {
                    method: method.to_string(),
                    error: err.to_string(),
                    body: params,
                }));
            }
        };

        if !status.is_success() {
            log::debug!("{} returned {}: {}", method, status, text);
            return Ok(RpcOutcome::Failure(RpcFailure {
                method: method.to_string(),
                error: format!("HTTP {status}: {text}"),
                body: params,
            }));
        }

        log::trace!("<-- {}", text);
        match serde_json::from_str(&text) {
            Ok(result) => Ok(RpcOutcome::Success(result)),
            Err(err) => Ok(RpcOutcome::Failure(RpcFailure {
                method: method.to_string(),
                error: err.to_string(),
                body: params,
            })),
        }
    }

    /// Publishes data into one channel.
    pub async fn publish(
        &self,
        channel: &str,
        data: Value,
        skip_history: bool,
    ) -> Result<RpcOutcome, Error> {
        self.call(
            "publish",
            json!({
                "channel": channel,
                "data": data,
                "skip_history": skip_history,
            }),
        )
        .await
    }

    /// Publishes the same data into multiple channels at once.
    pub async fn broadcast(
        &self,
        channels: &[String],
        data: Value,
        skip_history: bool,
    ) -> Result<RpcOutcome, Error> {
        self.call(
            "broadcast",
            json!({
                "channels": channels,
                "data": data,
                "skip_history": skip_history,
            }),
        )
        .await
    }

    /// Lists clients currently subscribed to a channel.
    pub async fn presence(&self, channel: &str) -> Result<RpcOutcome, Error> {
        self.call("presence", json!({ "channel": channel })).await
    }

    /// Short-form presence information for a channel.
    pub async fn presence_stats(&self, channel: &str) -> Result<RpcOutcome, Error> {
        self.call("presence_stats", json!({ "channel": channel })).await
    }

    /// Reads channel history, newest-first when `reverse` is set.
    pub async fn history(
        &self,
        channel: &str,
        limit: u32,
        since: Option<StreamPosition>,
        reverse: bool,
    ) -> Result<RpcOutcome, Error> {
        let mut params = json!({
            "channel": channel,
            "limit": limit,
            "reverse": reverse,
        });
        if let Some(since) = since {
            params["since"] = serde_json::to_value(since)?;
        }
        self.call("history", params).await
    }

    /// Removes channel history.
    pub async fn history_remove(&self, channel: &str) -> Result<RpcOutcome, Error> {
        self.call("history_remove", json!({ "channel": channel })).await
    }

    /// Subscribes a user to a channel server-side.
    pub async fn subscribe(
        &self,
        channel: &str,
        user: &str,
        client: &str,
    ) -> Result<RpcOutcome, Error> {
        self.call(
            "subscribe",
            json!({ "channel": channel, "user": user, "client": client }),
        )
        .await
    }

    /// Unsubscribes a user from a channel.
    pub async fn unsubscribe(
        &self,
        channel: &str,
        user: &str,
        client: &str,
    ) -> Result<RpcOutcome, Error> {
        self.call(
            "unsubscribe",
            json!({ "channel": channel, "user": user, "client": client }),
        )
        .await
    }

    /// Disconnects a user by id.
    pub async fn disconnect(&self, user: &str, client: &str) -> Result<RpcOutcome, Error> {
        self.call("disconnect", json!({ "user": user, "client": client }))
            .await
    }

    /// Lists active channels matching a pattern.
    pub async fn channels(&self, pattern: &str) -> Result<RpcOutcome, Error> {
        self.call("channels", json!({ "pattern": pattern })).await
    }

    /// Returns information about running server nodes.
    pub async fn info(&self) -> Result<RpcOutcome, Error> {
        self.call("info", json!({})).await
    }

    /// Issues a connection token signed with the configured secret.
    pub fn connection_token(&self, claims: &ConnectionClaims) -> Result<String, Error> {
        token::sign(claims, &self.config.secret)
    }

    /// Issues a private-channel subscription token signed with the
    /// configured secret.
    pub fn subscription_token(&self, claims: &SubscriptionClaims) -> Result<String, Error> {
        token::sign(claims, &self.config.secret)
    }

    // url may or may not carry the /api suffix already
    fn endpoint(&self) -> String {
        let address = self.config.url.trim_end_matches('/');
        if address.ends_with(API_PATH) {
            address.to_string()
        } else {
            format!("{address}{API_PATH}")
        }
    }
}
