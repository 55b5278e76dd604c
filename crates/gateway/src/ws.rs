use core::time::Duration;

use anyhow::{Context as _, Result};
use bot_core::{Event, stop_requested, truncate};
use futures_util::StreamExt as _;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Message as WsMessage,
        client::IntoClientRequest as _,
        http::{HeaderValue, header::AUTHORIZATION},
    },
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct EventSourceConfig {
    pub url: String,
    pub access_token: Option<String>,
    pub reconnect_delay: Duration,
}

/// Streams decoded events into `events` until shutdown or until the receiver
/// is dropped, reconnecting after `reconnect_delay` whenever the socket ends.
pub async fn run_event_source(
    config: EventSourceConfig,
    events: mpsc::Sender<Event>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = run_session(&config, &events) => match result {
                Ok(()) => info!(url = %config.url, "Event socket closed"),
                Err(e) => warn!(url = %config.url, error = ?e, "Event socket failed"),
            },
            () = stop_requested(&mut shutdown) => return,
        }
        if events.is_closed() {
            return;
        }
        info!(delay_secs = config.reconnect_delay.as_secs(), "Reconnecting to event socket");
        tokio::select! {
            () = tokio::time::sleep(config.reconnect_delay) => {}
            () = stop_requested(&mut shutdown) => return,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Payload {
    Text(String),
    Close,
    Control,
}

/// Pulls the event text out of a frame. An error concerns this frame alone.
fn frame_text(frame: WsMessage) -> Result<Payload> {
    Ok(match frame {
        WsMessage::Text(text) => Payload::Text(text.as_str().to_owned()),
        WsMessage::Binary(bytes) => {
            Payload::Text(String::from_utf8(bytes.to_vec()).context("event frame is not utf-8")?)
        }
        WsMessage::Close(_) => Payload::Close,
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => Payload::Control,
    })
}

async fn run_session(config: &EventSourceConfig, events: &mpsc::Sender<Event>) -> Result<()> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .context("invalid event socket url")?;
    if let Some(token) = &config.access_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("access token is not a valid header value")?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    let (mut stream, _response) = connect_async(request)
        .await
        .context("connecting to event socket")?;
    info!(url = %config.url, "Event socket connected");

    while let Some(frame) = stream.next().await {
        let frame = frame.context("reading event socket")?;
        let text = match frame_text(frame) {
            Ok(Payload::Text(text)) => text,
            Ok(Payload::Close) => return Ok(()),
            Ok(Payload::Control) => continue,
            Err(e) => {
                warn!(error = ?e, "Dropping unreadable frame");
                continue;
            }
        };
        match crate::onebot::decode_frame(&text) {
            Ok(Some(event)) => {
                if events.send(event).await.is_err() {
                    return Ok(());
                }
            }
            Ok(None) => debug!(frame = %truncate(&text, 200), "Ignoring frame"),
            Err(e) => warn!(error = ?e, frame = %truncate(&text, 200), "Dropping undecodable frame"),
        }
    }
    Ok(())
}
