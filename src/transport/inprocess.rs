use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::error::TransportError;

use super::{Transport, TransportListener};

const CHANNEL_CAPACITY: usize = 64;

/// Two directly-connected in-process transports, useful for tests and for
/// same-process client/server pairs that skip the network entirely.
pub struct InProcessTransport {
    tx: mpsc::Sender<Envelope>,
    rx: mpsc::Receiver<Envelope>,
    connected: bool,
}

impl InProcessTransport {
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel(CHANNEL_CAPACITY);
        let (tx_b, rx_a) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self { tx: tx_a, rx: rx_a, connected: true },
            Self { tx: tx_b, rx: rx_b, connected: true },
        )
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        self.tx
            .send(envelope.clone())
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(&mut self) -> Result<Option<Envelope>, TransportError> {
        match self.rx.recv().await {
            Some(envelope) => Ok(Some(envelope)),
            None => {
                self.connected = false;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        self.rx.close();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn local_address(&self) -> Option<String> {
        None
    }

    fn remote_address(&self) -> Option<String> {
        None
    }
}

type Rendezvous = mpsc::Sender<InProcessTransport>;

/// Named rendezvous points for in-process servers: a server registers a name
/// with [`InProcessListener::bind`], clients connect to it with
/// [`connect`] without either side touching a socket.
static DIRECTORY: Lazy<Mutex<HashMap<String, Rendezvous>>> = Lazy::new(|| Mutex::new(HashMap::new()));

pub struct InProcessListener {
    name: String,
    rx: mpsc::Receiver<InProcessTransport>,
}

impl InProcessListener {
    pub fn bind(name: impl Into<String>) -> Result<Self, TransportError> {
        let name = name.into();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut directory = DIRECTORY.lock();
        if directory.contains_key(&name) {
            return Err(TransportError::MalformedFrame(format!(
                "address {name} already bound"
            )));
        }
        directory.insert(name.clone(), tx);
        Ok(Self { name, rx })
    }
}

#[async_trait]
impl TransportListener for InProcessListener {
    async fn accept(&mut self) -> Result<Box<dyn Transport>, TransportError> {
        self.rx
            .recv()
            .await
            .map(|transport| Box::new(transport) as Box<dyn Transport>)
            .ok_or(TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        DIRECTORY.lock().remove(&self.name);
        self.rx.close();
        Ok(())
    }

    fn local_address(&self) -> Option<String> {
        Some(self.name.clone())
    }
}

/// Connects to a listener previously bound with [`InProcessListener::bind`].
pub async fn connect(name: &str) -> Result<InProcessTransport, TransportError> {
    let sender = {
        let directory = DIRECTORY.lock();
        directory
            .get(name)
            .cloned()
            .ok_or_else(|| TransportError::MalformedFrame(format!("no listener bound at {name}")))?
    };
    let (client, server) = InProcessTransport::pair();
    sender
        .send(server)
        .await
        .map_err(|_| TransportError::MalformedFrame(format!("listener at {name} is no longer accepting")))?;
    Ok(client)
}
