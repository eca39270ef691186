//! WebSocket transport.
//!
//! JSON text frames both directions: a [`ClientMessage::Setup`] after the
//! socket opens, then media chunks outbound and [`ServerEvent`]s inbound. A
//! dedicated reader task pumps inbound frames into the session's event
//! channel; socket close or error ends that channel.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::messages::{ClientMessage, MediaChunk, ServerEvent, SetupMessage};
use super::{Transport, TransportConn, TransportSender};
use crate::error::{Error, Result};
use crate::session::SessionConfig;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// WebSocket client for the remote streaming speech endpoint.
pub struct WsTransport {
    url: String,
    api_key: Option<String>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
        }
    }

    fn build_request(&self) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Connect(e.to_string()))?;
        if let Some(key) = &self.api_key {
            let value = key
                .parse()
                .map_err(|_| Error::Connect("api key is not a valid header value".to_string()))?;
            request.headers_mut().insert("x-api-key", value);
        }
        Ok(request)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, config: &SessionConfig) -> Result<TransportConn> {
        info!(url = %self.url, "connecting to speech endpoint");

        let request = self.build_request()?;
        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let setup = ClientMessage::Setup(SetupMessage::from(config));
        send_json(&mut sink, &setup)
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;

        // The session is up once the remote acknowledges the setup.
        wait_for_ack(&mut source).await?;
        info!("speech endpoint acknowledged setup");

        let (events_tx, events_rx) = mpsc::channel(64);
        tokio::spawn(read_events(source, events_tx));

        Ok(TransportConn {
            sender: Box::new(WsSender { sink }),
            events: events_rx,
        })
    }
}

async fn send_json(sink: &mut WsSink, message: &ClientMessage) -> Result<()> {
    let text = serde_json::to_string(message).map_err(|e| Error::Transport(e.to_string()))?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| Error::Transport(e.to_string()))
}

async fn wait_for_ack(source: &mut WsSource) -> Result<()> {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(text.as_ref()) {
                Ok(event) if event.setup_complete => return Ok(()),
                Ok(_) => warn!("unexpected event before setup acknowledgement"),
                Err(e) => return Err(Error::Connect(format!("malformed ack: {e}"))),
            },
            Ok(Message::Close(_)) => {
                return Err(Error::Connect("remote closed during handshake".to_string()))
            }
            Ok(_) => {}
            Err(e) => return Err(Error::Connect(e.to_string())),
        }
    }
    Err(Error::Connect("socket ended during handshake".to_string()))
}

/// Pump inbound frames into the session's event channel until the socket ends.
async fn read_events(mut source: WsSource, events_tx: mpsc::Sender<ServerEvent>) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(text.as_ref()) {
                Ok(event) => {
                    if events_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("dropping malformed server event: {e}"),
            },
            Ok(Message::Close(_)) => {
                debug!("remote closed the socket");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("transport read failed: {e}");
                break;
            }
        }
    }
    // Dropping events_tx closes the session's inbound stream.
}

struct WsSender {
    sink: WsSink,
}

#[async_trait]
impl TransportSender for WsSender {
    async fn send(&mut self, chunk: MediaChunk) -> Result<()> {
        send_json(&mut self.sink, &ClientMessage::Media(chunk)).await
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}
