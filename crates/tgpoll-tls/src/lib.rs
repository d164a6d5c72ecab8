//! TLS transport adapter (tokio-rustls).
//!
//! This crate implements the `tgpoll-core` Connector / TransportStream ports
//! over TCP + TLS, trusting the bundled webpki roots.

use std::{io, sync::Arc};

use async_trait::async_trait;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::{client::TlsStream, rustls};

pub mod runner;

use tgpoll_core::{
    errors::Error,
    ports::{Connector, Endpoint, ReadOutcome, TransportStream, WriteOutcome},
    Result,
};

#[derive(Clone)]
pub struct TlsConnector {
    tls: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    /// Connector trusting the Mozilla root set shipped with `webpki-roots`.
    pub fn new() -> Result<Self> {
        let roots =
            rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Config(format!("tls setup failed: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self::with_config(config))
    }

    pub fn with_config(config: rustls::ClientConfig) -> Self {
        Self {
            tls: tokio_rustls::TlsConnector::from(Arc::new(config)),
        }
    }

    fn server_name(host: &str) -> Result<rustls::pki_types::ServerName<'static>> {
        rustls::pki_types::ServerName::try_from(host.to_string())
            .map_err(|e| Error::TransportOpenFailed(format!("invalid server name {host:?}: {e}")))
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn TransportStream>> {
        let name = Self::server_name(&endpoint.host)?;

        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| {
                Error::TransportOpenFailed(format!(
                    "tcp connect to {}:{} failed: {e}",
                    endpoint.host, endpoint.port
                ))
            })?;
        if let Err(e) = tcp.set_nodelay(true) {
            tracing::debug!(error = %e, "cannot disable nagle");
        }
        tracing::trace!(host = %endpoint.host, "tcp connected");

        let stream = self.tls.connect(name, tcp).await.map_err(|e| {
            Error::TransportOpenFailed(format!("tls handshake with {} failed: {e}", endpoint.host))
        })?;
        tracing::debug!(host = %endpoint.host, "tls handshake complete");

        Ok(Box::new(TlsTransport { inner: stream }))
    }
}

struct TlsTransport {
    inner: TlsStream<TcpStream>,
}

#[async_trait]
impl TransportStream for TlsTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<WriteOutcome> {
        let written = self.inner.write(bytes).await;
        let outcome = map_write(written)?;
        if let WriteOutcome::Written(_) = outcome {
            // Push the TLS records out before we start waiting for a response.
            map_write(self.inner.flush().await.map(|_| 0))?;
        }
        Ok(outcome)
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        map_read(self.inner.read(buf).await)
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

fn is_would_block(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn map_write(res: io::Result<usize>) -> Result<WriteOutcome> {
    match res {
        Ok(n) => Ok(WriteOutcome::Written(n)),
        Err(e) if is_would_block(&e) => Ok(WriteOutcome::WouldBlock),
        Err(e) => Err(Error::TransportWriteFailed(e.to_string())),
    }
}

fn map_read(res: io::Result<usize>) -> Result<ReadOutcome> {
    match res {
        Ok(0) => Ok(ReadOutcome::Closed),
        Ok(n) => Ok(ReadOutcome::Data(n)),
        Err(e) if is_would_block(&e) => Ok(ReadOutcome::WouldBlock),
        // Servers behind `Connection: close` often drop the socket without a
        // close_notify alert; the body is complete by then.
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(ReadOutcome::Closed),
        Err(e) => Err(Error::TransportReadFailed(e.to_string())),
    }
}
