//! Push channel subscription. The backend delivers unsolicited updates
//! over a long-lived WebSocket, each text frame carrying a JSON
//! envelope `{"event": <name>, "payload": <body>}` whose body mirrors
//! the corresponding REST response.

use crate::{
    api::models::{AnnouncementConfig, CountdownConfig, HeroConfig},
    sync::LeaderboardSync,
};
use futures_util::StreamExt;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Delay before reconnecting after the channel drops
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Events delivered over the push channel. Leaderboard, prize and
/// announcement payloads stay raw JSON so the merge policy can validate
/// their shape itself.
#[derive(Debug)]
pub enum PushEvent {
    Leaderboard(Value),
    Prizes(Value),
    Hero(HeroConfig),
    Countdown(CountdownConfig),
    Announcement(AnnouncementConfig),
}

/// Envelope wrapping every push frame
#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Value,
}

/// Parses a text frame into a push event. Unknown events and malformed
/// frames produce None and are dropped by the caller.
fn parse_frame(frame: &str) -> Option<PushEvent> {
    let envelope: Envelope = serde_json::from_str(frame).ok()?;
    match envelope.event.as_str() {
        "leaderboard:update" => Some(PushEvent::Leaderboard(envelope.payload)),
        "prizes:update" => Some(PushEvent::Prizes(envelope.payload)),
        "hero:update" => serde_json::from_value(envelope.payload)
            .ok()
            .map(PushEvent::Hero),
        "countdown:update" => serde_json::from_value(envelope.payload)
            .ok()
            .map(PushEvent::Countdown),
        "announcement:update" => serde_json::from_value(envelope.payload)
            .ok()
            .map(PushEvent::Announcement),
        _ => None,
    }
}

/// Derives the WebSocket endpoint from the backend base URL
pub fn websocket_url(backend_url: &str) -> String {
    let url = backend_url
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!("{}/ws", url)
}

/// Handle to a running push subscription. Dropping the handle aborts
/// the subscription task, which is how the owning view tears the
/// channel down on every exit path.
pub struct PushHandle {
    task: JoinHandle<()>,
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns the push subscription task feeding events into the sync
/// client. Connection failures and disconnects retry after a fixed
/// delay for as long as the handle is alive.
pub fn subscribe(url: String, sync: Arc<LeaderboardSync>) -> PushHandle {
    let task = tokio::spawn(async move {
        loop {
            let (mut stream, _) = match connect_async(&url).await {
                Ok(value) => value,
                Err(err) => {
                    warn!("Push channel connect failed: {}", err);
                    sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };

            debug!("Push channel connected");

            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(frame)) => match parse_frame(&frame) {
                        Some(event) => sync.apply_push(event),
                        None => debug!("Dropped unrecognized push frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    // Pings are answered by the protocol layer, other
                    // frame types carry nothing for us
                    Ok(_) => {}
                    Err(err) => {
                        warn!("Push channel read failed: {}", err);
                        break;
                    }
                }
            }

            warn!("Push channel disconnected, reconnecting");
            sleep(RECONNECT_DELAY).await;
        }
    });

    PushHandle { task }
}

#[cfg(test)]
mod test {
    use super::{parse_frame, websocket_url, PushEvent};

    /// Tests that each documented event name parses to its event
    #[test]
    fn test_parse_known_events() {
        let frame = r#"{"event":"leaderboard:update","payload":[{"id":"a"}]}"#;
        assert!(matches!(
            parse_frame(frame),
            Some(PushEvent::Leaderboard(_))
        ));

        let frame = r#"{"event":"countdown:update","payload":{"end":"2026-01-01T00:00:00Z"}}"#;
        match parse_frame(frame) {
            Some(PushEvent::Countdown(config)) => assert!(config.end.is_some()),
            other => panic!("unexpected event: {:?}", other),
        }

        let frame = r#"{"event":"hero:update","payload":{"headline":"Race"}}"#;
        match parse_frame(frame) {
            Some(PushEvent::Hero(hero)) => {
                assert_eq!(hero.headline.as_deref(), Some("Race"))
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    /// Tests that unknown events and malformed frames are dropped
    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_frame(r#"{"event":"unknown:update","payload":{}}"#).is_none());
        assert!(parse_frame("not json at all").is_none());
        assert!(parse_frame(r#"{"payload":{}}"#).is_none());
    }

    /// Tests the backend URL to WebSocket endpoint mapping
    #[test]
    fn test_websocket_url() {
        assert_eq!(
            websocket_url("http://localhost:8080"),
            "ws://localhost:8080/ws"
        );
        assert_eq!(
            websocket_url("https://api.example.com"),
            "wss://api.example.com/ws"
        );
    }
}
