//! JSON-lines input on stdin
//!
//! Each line is one message:
//!
//! ```text
//! {"type": "state", "entity_id": "sensor.lounge_humidity", "state": 51.2}
//! {"type": "service", "service": "pause_control", "data": {"minutes": 30}}
//! ```
//!
//! State messages go straight into the telemetry store. Service messages are
//! dispatched through the registry and answered with one JSON line on stdout.

use chrono::Utc;
use hi_core::{Context, EntityId, STATE_UNKNOWN};
use hi_services::ServiceRegistry;
use hi_telemetry::TelemetryStore;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

const FEED_ORIGIN: &str = "stdin";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    State {
        entity_id: EntityId,
        state: Value,
        #[serde(default)]
        friendly_name: Option<String>,
    },
    Service {
        service: String,
        #[serde(default)]
        data: Value,
    },
}

/// Raw state text for a JSON value; sources send numbers and strings alike
fn state_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "on".to_string(),
        Value::Bool(false) => "off".to_string(),
        _ => STATE_UNKNOWN.to_string(),
    }
}

/// Apply one line; returns the reply for service calls
pub async fn handle_line(line: &str, store: &TelemetryStore, registry: &ServiceRegistry) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let message: FeedMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed feed line");
            return Some(json!({ "ok": false, "error": format!("malformed line: {}", e) }));
        }
    };

    match message {
        FeedMessage::State {
            entity_id,
            state,
            friendly_name,
        } => {
            store.set(entity_id, state_text(&state), friendly_name, Utc::now());
            None
        }
        FeedMessage::Service { service, data } => {
            let context = Context::with_origin(FEED_ORIGIN);
            let context_id = context.id.clone();
            let reply = match registry.call(&service, data, context).await {
                Ok(response) => json!({
                    "ok": true,
                    "service": service,
                    "context_id": context_id,
                    "response": response,
                }),
                Err(e) => {
                    warn!(service = %service, error = %e, "Service call failed");
                    json!({
                        "ok": false,
                        "service": service,
                        "context_id": context_id,
                        "error": e.to_string(),
                    })
                }
            };
            Some(reply)
        }
    }
}

/// Read lines until end of input, writing replies to `out`
pub async fn run_feed<R, W>(reader: R, mut out: W, store: &TelemetryStore, registry: &ServiceRegistry) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(reply) = handle_line(&line, store, registry).await {
            out.write_all(reply.to_string().as_bytes()).await?;
            out.write_all(b"\n").await?;
            out.flush().await?;
        }
    }
    debug!("Feed reached end of input");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hi_services::ServiceCall;

    fn make_test_registry() -> ServiceRegistry {
        let registry = ServiceRegistry::new();
        registry.register("echo", None, |call: ServiceCall| async move {
            Ok(json!({ "data": call.data, "origin": call.context.origin }))
        });
        registry
    }

    #[tokio::test]
    async fn test_state_lines_fill_store() {
        let store = TelemetryStore::new();
        let registry = make_test_registry();

        let reply = handle_line(
            r#"{"type":"state","entity_id":"sensor.lounge_humidity","state":51.2,"friendly_name":"Lounge"}"#,
            &store,
            &registry,
        )
        .await;
        assert!(reply.is_none());
        handle_line(r#"{"type":"state","entity_id":"binary_sensor.door","state":true}"#, &store, &registry).await;

        let id: EntityId = "sensor.lounge_humidity".parse().unwrap();
        assert_eq!(store.get(&id).and_then(|s| s.numeric()), Some(51.2));
        assert_eq!(store.display_name(&id), "Lounge");
        assert_eq!(
            store.state_of(&"binary_sensor.door".parse().unwrap()).as_deref(),
            Some("on")
        );
    }

    #[tokio::test]
    async fn test_service_lines_answer() {
        let store = TelemetryStore::new();
        let registry = make_test_registry();

        let reply = handle_line(r#"{"type":"service","service":"echo","data":{"x":1}}"#, &store, &registry)
            .await
            .unwrap();
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["response"]["data"], json!({"x": 1}));
        assert_eq!(reply["response"]["origin"], "stdin");

        let reply = handle_line(r#"{"type":"service","service":"nope"}"#, &store, &registry)
            .await
            .unwrap();
        assert_eq!(reply["ok"], false);
    }

    #[tokio::test]
    async fn test_run_feed_skips_bad_lines() {
        let store = TelemetryStore::new();
        let registry = make_test_registry();
        let input = concat!(
            "not json\n",
            "\n",
            "{\"type\":\"state\",\"entity_id\":\"sensor.a\",\"state\":\"7\"}\n",
            "{\"type\":\"service\",\"service\":\"echo\"}\n",
        );
        let mut out = Vec::new();

        run_feed(input.as_bytes(), &mut out, &store, &registry).await.unwrap();

        let replies: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["ok"], false);
        assert_eq!(replies[1]["ok"], true);
        assert_eq!(store.len(), 1);
    }
}
