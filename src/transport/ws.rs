//! Websocket [`RoomClient`] speaking the relay's JSON frame protocol.
//!
//! LIFECYCLE
//! =========
//! 1. `on_message` / `on_participants` store handlers (before connect)
//! 2. `connect` opens `{url}/rtc?access_token={token}` and spawns a reader
//!    task (frames → handlers) and a writer task (outbound channel → socket)
//! 3. `send_message` queues a data frame on the outbound channel
//! 4. `disconnect` silences the handlers, lets the writer send Close and
//!    waits (bounded by [`CLOSE_TIMEOUT`]) for the relay to finish the close
//!    handshake. Once it returns the relay has parted this member, so a
//!    reconnect never overlaps the old membership.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::wire::RelayFrame;
use super::{MessageHandler, RoomClient, RosterHandler, TransportError};
use crate::types::MessagePayload;

/// Upper bound on each half of the close handshake.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct Handlers {
    on_message: RwLock<Option<MessageHandler>>,
    on_roster: RwLock<Option<RosterHandler>>,
}

impl Handlers {
    fn dispatch(&self, frame: RelayFrame) {
        match frame {
            RelayFrame::Data { payload } => {
                if let Ok(guard) = self.on_message.read() {
                    if let Some(handler) = guard.as_ref() {
                        handler(payload);
                    }
                }
            }
            RelayFrame::Roster { participants } => {
                if let Ok(guard) = self.on_roster.read() {
                    if let Some(handler) = guard.as_ref() {
                        handler(participants);
                    }
                }
            }
        }
    }
}

struct Link {
    outbound: mpsc::UnboundedSender<RelayFrame>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    /// Set when teardown starts; the reader stops dispatching.
    closing: Arc<AtomicBool>,
}

/// Room client over a websocket to the relay.
#[derive(Default)]
pub struct WsRoomClient {
    handlers: Arc<Handlers>,
    link: Mutex<Option<Link>>,
}

impl WsRoomClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn take_link(&self) -> Option<Link> {
        self.link.lock().ok().and_then(|mut guard| guard.take())
    }
}

/// Build the relay upgrade URL for a base room URL and token.
#[must_use]
pub fn rtc_url(base: &str, token: &str) -> String {
    format!("{}/rtc?access_token={token}", base.trim_end_matches('/'))
}

#[async_trait::async_trait]
impl RoomClient for WsRoomClient {
    fn on_message(&self, handler: MessageHandler) {
        if let Ok(mut guard) = self.handlers.on_message.write() {
            *guard = Some(handler);
        }
    }

    fn on_participants(&self, handler: RosterHandler) {
        if let Ok(mut guard) = self.handlers.on_roster.write() {
            *guard = Some(handler);
        }
    }

    async fn connect(&self, url: &str, token: &str) -> Result<(), TransportError> {
        // Reconnecting replaces the previous link.
        self.disconnect().await;

        let (stream, _response) = connect_async(rtc_url(url, token))
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut ws_write, mut ws_read) = stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<RelayFrame>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match frame.to_text() {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(error = %e, "ws client: failed to encode frame");
                        continue;
                    }
                };
                if ws_write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            // Outbound channel closed: start the close handshake.
            let _ = ws_write.close().await;
        });

        let handlers = Arc::clone(&self.handlers);
        let closing = Arc::new(AtomicBool::new(false));
        let reader_closing = Arc::clone(&closing);
        let reader = tokio::spawn(async move {
            while let Some(msg) = ws_read.next().await {
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(_) if reader_closing.load(Ordering::SeqCst) => {}
                    Message::Text(text) => match RelayFrame::from_text(text.as_str()) {
                        Ok(frame) => handlers.dispatch(frame),
                        Err(e) => debug!(error = %e, "ws client: ignoring unknown frame"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            debug!("ws client: reader finished");
        });

        if let Ok(mut guard) = self.link.lock() {
            *guard = Some(Link { outbound, writer, reader, closing });
        }
        info!(url, "ws client: connected");
        Ok(())
    }

    async fn send_message(&self, payload: &MessagePayload) -> Result<(), TransportError> {
        let guard = self
            .link
            .lock()
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        let Some(link) = guard.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        link.outbound
            .send(RelayFrame::Data { payload: payload.clone() })
            .map_err(|_| TransportError::NotConnected)
    }

    async fn disconnect(&self) {
        let Some(link) = self.take_link() else { return };
        let Link { outbound, mut writer, mut reader, closing } = link;
        closing.store(true, Ordering::SeqCst);
        drop(outbound);

        if timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
            warn!("ws client: close frame not sent in time");
            writer.abort();
        }
        // The reader ends when the relay answers the close or drops the socket.
        if timeout(CLOSE_TIMEOUT, &mut reader).await.is_err() {
            warn!("ws client: relay did not finish the close handshake in time");
            reader.abort();
        }
        info!("ws client: disconnected");
    }
}
