use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use centrifugo_broadcast::api::ApiClient;
use centrifugo_broadcast::broadcast::{
    Access, AuthReply, AuthRequest, Broadcaster, ChannelAuth, Grant, SubscriptionAuth,
};
use centrifugo_broadcast::config::Config;
use centrifugo_broadcast::errors::Error;
use centrifugo_broadcast::token::ConnectionClaims;
use serde_json::json;

const CLIENT_ID: &str = "f2527b6a-6705-45b7-a1d9-d0029943dc20";

fn broadcaster() -> Broadcaster {
    let config = Config::new().with_secret("secret").with_api_key("api-key");
    Broadcaster::new(ApiClient::new(config).unwrap())
}

fn request(channels: &[&str]) -> AuthRequest {
    AuthRequest {
        user: Some("42".to_string()),
        client: CLIENT_ID.to_string(),
        channels: channels.iter().map(|c| c.to_string()).collect(),
    }
}

#[test]
fn test_config_defaults() {
    let config = Config::new();

    assert_eq!(config.url, "http://localhost:8000");
    assert_eq!(config.secret, "");
    assert_eq!(config.api_key, "");
    assert!(config.tls_verify);
    assert_eq!(config.ssl_key, None);
    assert_eq!(config.namespace, None);
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_tries, 1);
}

#[test]
fn test_config_builder() {
    let config = Config::new()
        .with_url("https://centrifugo.example.com")
        .with_secret("s")
        .with_api_key("k")
        .with_tls_verify(false)
        .with_namespace("chat")
        .with_timeout(Duration::from_secs(1))
        .with_max_tries(3);

    assert_eq!(config.url, "https://centrifugo.example.com");
    assert_eq!(config.secret, "s");
    assert_eq!(config.api_key, "k");
    assert!(!config.tls_verify);
    assert_eq!(config.namespace.as_deref(), Some("chat"));
    assert_eq!(config.timeout, Duration::from_secs(1));
    assert_eq!(config.max_tries, 3);
}

#[test]
fn test_connection_token_uses_configured_secret() {
    let client = ApiClient::new(Config::new().with_secret("secret")).unwrap();

    let token = client
        .connection_token(&ConnectionClaims::new(CLIENT_ID))
        .unwrap();
    assert_eq!(
        token,
        "eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9.\
         eyJzdWIiOiJmMjUyN2I2YS02NzA1LTQ1YjctYTFkOS1kMDAyOTk0M2RjMjAifQ.\
         csRuDJhBalF3J3v6JnsNZmOXLx6nbNMi3zcCieJJqng"
    );
}

#[test]
fn test_missing_secret_refuses_to_sign() {
    let client = ApiClient::new(Config::new()).unwrap();

    let result = client.connection_token(&ConnectionClaims::new(CLIENT_ID));
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[tokio::test]
async fn test_authorize_requires_user() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let mut broadcaster = broadcaster();
    broadcaster.on_access(move |_request, _channel| {
        let seen = seen.clone();
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Access::Granted(Grant::new()))
        }
    });

    let mut unauthenticated = request(&["news"]);
    unauthenticated.user = None;

    let result = broadcaster.authorize(&unauthenticated).await;
    assert!(matches!(result, Err(Error::Unauthorized)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_denied_channel_is_data() {
    // the default guard denies everything
    let broadcaster = broadcaster();

    let reply = broadcaster.authorize(&request(&["news"])).await.unwrap();
    let AuthReply::Connections(map) = reply else {
        panic!("expected per-channel map");
    };
    assert_eq!(map.get("news"), Some(&ChannelAuth::Denied { status: 403 }));
}

#[tokio::test]
async fn test_guard_denial_error_is_data() {
    let mut broadcaster = broadcaster();
    broadcaster.on_access(|_request, _channel| async { Err(Error::AccessDenied) });

    let reply = broadcaster.authorize(&request(&["news"])).await.unwrap();
    let AuthReply::Connections(map) = reply else {
        panic!("expected per-channel map");
    };
    assert_eq!(map.get("news"), Some(&ChannelAuth::Denied { status: 403 }));
}

#[tokio::test]
async fn test_guard_fatal_error_propagates() {
    let mut broadcaster = broadcaster();
    broadcaster
        .on_access(|_request, _channel| async { Err(Error::Configuration("db down".to_string())) });

    let result = broadcaster.authorize(&request(&["news"])).await;
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[tokio::test]
async fn test_public_grant_issues_connection_sign() {
    let mut broadcaster = broadcaster();
    broadcaster.on_access(|_request, _channel| async { Ok(Access::Granted(Grant::new())) });

    let reply = broadcaster.authorize(&request(&["news"])).await.unwrap();
    let AuthReply::Connections(map) = reply else {
        panic!("expected per-channel map");
    };
    let Some(ChannelAuth::Granted { sign, info }) = map.get("news") else {
        panic!("expected granted entry");
    };
    assert_eq!(sign.split('.').count(), 3);
    assert_eq!(info, &json!({}));
}

#[tokio::test]
async fn test_private_channel_routes_to_channels_list() {
    let mut broadcaster = broadcaster();
    broadcaster.on_access(|_request, _channel| async { Ok(Access::Granted(Grant::new())) });

    let reply = broadcaster.authorize(&request(&["$room"])).await.unwrap();
    let AuthReply::Subscriptions { channels } = reply else {
        panic!("expected channels list");
    };
    assert_eq!(channels.len(), 1);
    let SubscriptionAuth::Granted {
        channel,
        token,
        info,
    } = &channels[0]
    else {
        panic!("expected granted entry");
    };
    assert_eq!(channel, "$room");
    assert_eq!(token.split('.').count(), 3);
    assert_eq!(info, &json!({}));
}

#[tokio::test]
async fn test_mixed_request_prefers_private_envelope() {
    let mut broadcaster = broadcaster();
    broadcaster.on_access(|_request, _channel| async { Ok(Access::Granted(Grant::new())) });

    let reply = broadcaster
        .authorize(&request(&["news", "$room"]))
        .await
        .unwrap();
    let AuthReply::Subscriptions { channels } = reply else {
        panic!("expected channels list");
    };
    assert_eq!(channels.len(), 1);
}

#[tokio::test]
async fn test_channels_deduplicated_in_request_order() {
    let mut broadcaster = broadcaster();
    broadcaster.on_access(|_request, _channel| async { Ok(Access::Granted(Grant::new())) });

    let reply = broadcaster
        .authorize(&request(&["beta", "alpha", "beta"]))
        .await
        .unwrap();
    let AuthReply::Connections(map) = reply else {
        panic!("expected per-channel map");
    };
    let keys: Vec<&str> = map.keys().map(String::as_str).collect();
    assert_eq!(keys, ["beta", "alpha"]);
}

#[tokio::test]
async fn test_guard_sees_bare_channel_name() {
    let config = Config::new()
        .with_secret("secret")
        .with_api_key("api-key")
        .with_namespace("chat");
    let mut broadcaster = Broadcaster::new(ApiClient::new(config).unwrap());

    let names = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = names.clone();
    broadcaster.on_access(move |_request, channel| {
        let seen = seen.clone();
        async move {
            seen.lock().unwrap().push(channel);
            Ok(Access::Granted(Grant::new()))
        }
    });

    broadcaster
        .authorize(&request(&["$chat:room", "chat:news"]))
        .await
        .unwrap();
    assert_eq!(*names.lock().unwrap(), ["room", "news"]);
}

#[tokio::test]
async fn test_grant_info_embedded_in_reply() {
    let mut broadcaster = broadcaster();
    broadcaster.on_access(|_request, _channel| async {
        Ok(Access::Granted(Grant {
            info: Some(json!({"role": "admin"})),
            ..Grant::default()
        }))
    });

    let reply = broadcaster.authorize(&request(&["news"])).await.unwrap();
    let AuthReply::Connections(map) = reply else {
        panic!("expected per-channel map");
    };
    let Some(ChannelAuth::Granted { info, .. }) = map.get("news") else {
        panic!("expected granted entry");
    };
    assert_eq!(info, &json!({"role": "admin"}));
}
