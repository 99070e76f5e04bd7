use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::envelope::{CompressionOption, Envelope, EncryptionOption};
use crate::error::TransportError;

use super::{Transport, TransportListener};

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send + Sync {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> AsyncStream for T {}

/// Newline-delimited JSON over TCP, with an optional in-place upgrade to TLS.
///
/// The upgrade replaces the inner stream rather than the transport: callers
/// keep sending and receiving through the same `TcpTransport` value before
/// and after `set_encryption(Tls)` runs.
pub struct TcpTransport {
    io: Option<BufReader<Box<dyn AsyncStream>>>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
    connector: Option<TlsConnector>,
    acceptor: Option<TlsAcceptor>,
    server_name: Option<ServerName<'static>>,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> std::io::Result<Self> {
        let local_addr = stream.local_addr().ok();
        let peer_addr = stream.peer_addr().ok();
        Ok(Self {
            io: Some(BufReader::new(Box::new(stream))),
            local_addr,
            peer_addr,
            connector: None,
            acceptor: None,
            server_name: None,
        })
    }

    /// Enables a client-side `set_encryption(Tls)` upgrade.
    pub fn with_tls_connector(mut self, connector: TlsConnector, server_name: ServerName<'static>) -> Self {
        self.connector = Some(connector);
        self.server_name = Some(server_name);
        self
    }

    /// Enables a server-side `set_encryption(Tls)` upgrade.
    pub fn with_tls_acceptor(mut self, acceptor: TlsAcceptor) -> Self {
        self.acceptor = Some(acceptor);
        self
    }

    fn io_mut(&mut self) -> Result<&mut BufReader<Box<dyn AsyncStream>>, TransportError> {
        self.io.as_mut().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        let mut line = serde_json::to_string(envelope)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
        line.push('\n');
        let io = self.io_mut()?;
        io.write_all(line.as_bytes()).await?;
        io.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<Envelope>, TransportError> {
        let mut line = String::new();
        let n = self.io_mut()?.read_line(&mut line).await?;
        if n == 0 {
            self.io = None;
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        let envelope = serde_json::from_str(trimmed)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
        Ok(Some(envelope))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(io) = self.io.as_mut() {
            io.shutdown().await?;
        }
        self.io = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.io.is_some()
    }

    async fn set_encryption(&mut self, option: EncryptionOption) -> Result<(), TransportError> {
        match option {
            EncryptionOption::None => Ok(()),
            EncryptionOption::Tls => {
                let inner = self.io.take().ok_or(TransportError::Closed)?.into_inner();
                if let Some(connector) = self.connector.clone() {
                    let server_name = self.server_name.clone().ok_or_else(|| {
                        TransportError::Tls("no server name configured for client upgrade".into())
                    })?;
                    let tls = connector
                        .connect(server_name, inner)
                        .await
                        .map_err(|e| TransportError::Tls(e.to_string()))?;
                    self.io = Some(BufReader::new(Box::new(tls)));
                    Ok(())
                } else if let Some(acceptor) = self.acceptor.clone() {
                    let tls = acceptor
                        .accept(inner)
                        .await
                        .map_err(|e| TransportError::Tls(e.to_string()))?;
                    self.io = Some(BufReader::new(Box::new(tls)));
                    Ok(())
                } else {
                    Err(TransportError::UnsupportedEncryption(option))
                }
            }
        }
    }

    fn supported_encryption_options(&self) -> Vec<EncryptionOption> {
        if self.connector.is_some() || self.acceptor.is_some() {
            vec![EncryptionOption::None, EncryptionOption::Tls]
        } else {
            vec![EncryptionOption::None]
        }
    }

    fn supported_compression_options(&self) -> Vec<CompressionOption> {
        vec![CompressionOption::None]
    }

    fn local_address(&self) -> Option<String> {
        self.local_addr.map(|a| a.to_string())
    }

    fn remote_address(&self) -> Option<String> {
        self.peer_addr.map(|a| a.to_string())
    }
}

/// Listens for plain TCP connections; TLS, when configured, is a later
/// in-place upgrade on the accepted [`TcpTransport`] rather than a listener
/// concern.
pub struct TcpTransportListener {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
}

impl TcpTransportListener {
    pub async fn bind(addr: impl tokio::net::ToSocketAddrs) -> std::io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr).await?,
            acceptor: None,
        })
    }

    /// Every accepted transport is pre-armed for a `set_encryption(Tls)` call.
    pub fn with_tls_acceptor(mut self, acceptor: TlsAcceptor) -> Self {
        self.acceptor = Some(acceptor);
        self
    }
}

#[async_trait]
impl TransportListener for TcpTransportListener {
    async fn accept(&mut self) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, _) = self.listener.accept().await?;
        let mut transport = TcpTransport::new(stream)?;
        if let Some(acceptor) = self.acceptor.clone() {
            transport = transport.with_tls_acceptor(acceptor);
        }
        Ok(Box::new(transport))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn local_address(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}
