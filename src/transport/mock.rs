//! In-process transport for tests and offline demos.
//!
//! Records every outbound chunk and replays scripted inbound events, so
//! session behavior can be exercised without a remote endpoint.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::messages::{MediaChunk, ServerEvent, SetupMessage};
use super::{Transport, TransportConn, TransportSender};
use crate::error::{Error, Result};
use crate::session::SessionConfig;

#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<MediaChunk>>,
    setups: Mutex<Vec<SetupMessage>>,
    event_tx: Mutex<Option<mpsc::Sender<ServerEvent>>>,
    connects: AtomicUsize,
    fail_next_connect: AtomicBool,
}

/// Scripted [`Transport`]: clone-cheap handle shared between the session under
/// test and the test driving it.
#[derive(Clone, Default)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All chunks sent across every connection, in send order.
    pub fn sent(&self) -> Vec<MediaChunk> {
        self.shared.sent.lock().unwrap().clone()
    }

    /// Setup messages from each successful connect.
    pub fn setups(&self) -> Vec<SetupMessage> {
        self.shared.setups.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Deliver an inbound event to the live connection.
    ///
    /// Returns false if no connection is live or its event buffer is full.
    pub fn push_event(&self, event: ServerEvent) -> bool {
        match self.shared.event_tx.lock().unwrap().as_ref() {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Make the next `connect` fail with `Error::Connect`.
    pub fn fail_next_connect(&self) {
        self.shared.fail_next_connect.store(true, Ordering::SeqCst);
    }

    /// Simulate the remote dropping the transport mid-session.
    pub fn drop_remote(&self) {
        self.shared.event_tx.lock().unwrap().take();
    }

    /// True while a connection is live (not closed from either side).
    pub fn is_live(&self) -> bool {
        self.shared.event_tx.lock().unwrap().is_some()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, config: &SessionConfig) -> Result<TransportConn> {
        if self.shared.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err(Error::Connect("scripted connect failure".to_string()));
        }

        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        self.shared
            .setups
            .lock()
            .unwrap()
            .push(SetupMessage::from(config));

        let (events_tx, events_rx) = mpsc::channel(64);
        *self.shared.event_tx.lock().unwrap() = Some(events_tx);

        Ok(TransportConn {
            sender: Box::new(MockSender {
                shared: Arc::clone(&self.shared),
            }),
            events: events_rx,
        })
    }
}

struct MockSender {
    shared: Arc<Shared>,
}

#[async_trait]
impl TransportSender for MockSender {
    async fn send(&mut self, chunk: MediaChunk) -> Result<()> {
        self.shared.sent.lock().unwrap().push(chunk);
        Ok(())
    }

    async fn close(&mut self) {
        self.shared.event_tx.lock().unwrap().take();
    }
}
