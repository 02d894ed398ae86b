pub mod api;
pub mod broadcast;
pub mod channel;
pub mod config;
pub mod errors;
pub mod token;

// Broadcaster::publish_event takes a serde_json object payload, so we
// re-export the json types to make sure users have the same version.
pub use serde_json::{Map, Value, json};
