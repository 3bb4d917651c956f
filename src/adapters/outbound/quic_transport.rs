//! QUIC Transport
//!
//! Logical channels and outbound calls over QUIC (via Quinn).
//!
//! - `QuicChannel`: one reconnectable connection to a peer
//! - `QuicBatchCall`: one unidirectional stream per batch, bounded by a timeout
//! - `QuicCallFactory`: builds a call from the channel's live connection
//! - `QuicPeerConnector`: channels and forward calls for the client pool
//!
//! Nodes present self-signed certificates and clients skip verification;
//! channel security is handled beneath this layer.

use crate::adapters::codec::{decode_length, decode_message, encode_message, Message, MessageKind};
use crate::domain::entities::RoutableRecord;
use crate::domain::ports::{
    CallFactory, OutboundCall, PeerConnector, SendError, Transport, TransportError,
};
use crate::domain::value_objects::NodeAddress;
use async_trait::async_trait;
use parking_lot::RwLock;
use quinn::{ClientConfig, Connection, Endpoint, RecvStream, ServerConfig, VarInt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Install the ring crypto provider for rustls. Safe to call repeatedly.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn client_config() -> anyhow::Result<ClientConfig> {
    let client_crypto = quinn::rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
        .with_no_client_auth();

    Ok(ClientConfig::new(Arc::new(
        quinn::crypto::rustls::QuicClientConfig::try_from(client_crypto)?,
    )))
}

/// Client-only endpoint used to reach collectors or peers.
pub fn client_endpoint(bind: SocketAddr) -> anyhow::Result<Endpoint> {
    install_crypto_provider();
    let mut endpoint = Endpoint::client(bind)?;
    endpoint.set_default_client_config(client_config()?);
    Ok(endpoint)
}

/// Listening endpoint with a fresh self-signed certificate for `names`.
pub fn server_endpoint(bind: SocketAddr, names: Vec<String>) -> anyhow::Result<Endpoint> {
    install_crypto_provider();
    let cert = rcgen::generate_simple_self_signed(names)?;

    let cert_chain = vec![rustls::pki_types::CertificateDer::from(cert.cert.der().to_vec())];
    let private_key = rustls::pki_types::PrivateKeyDer::try_from(cert.key_pair.serialize_der())
        .map_err(|e| anyhow::anyhow!("failed to parse private key: {:?}", e))?;

    let server_crypto = quinn::rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)?;

    let server_config = ServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(server_crypto)?,
    ));

    let mut endpoint = Endpoint::server(server_config, bind)?;
    endpoint.set_default_client_config(client_config()?);
    Ok(endpoint)
}

/// Read one length-prefixed message from a stream.
pub async fn read_message(recv: &mut RecvStream) -> anyhow::Result<Message> {
    let mut header = [0u8; 4];
    recv.read_exact(&mut header).await?;
    let len = decode_length(&header)?;

    let mut body = vec![0u8; len];
    recv.read_exact(&mut body).await?;
    Ok(decode_message(&body)?)
}

/// Reconnectable connection to one peer.
pub struct QuicChannel {
    endpoint: Endpoint,
    connection: RwLock<Option<Connection>>,
}

impl QuicChannel {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connection: RwLock::new(None),
        }
    }

    /// The live connection, if any.
    pub fn connection(&self) -> Option<Connection> {
        self.connection.read().clone()
    }
}

fn server_name(addr: &NodeAddress) -> &str {
    match addr.host() {
        "" | "0.0.0.0" | "::" => "localhost",
        host => host,
    }
}

#[async_trait]
impl Transport for QuicChannel {
    async fn connect(&self, addr: &NodeAddress) -> Result<(), TransportError> {
        let socket = tokio::net::lookup_host(addr.as_str())
            .await
            .map_err(|e| TransportError::Resolve(format!("{}: {}", addr, e)))?
            .next()
            .ok_or_else(|| TransportError::Resolve(addr.to_string()))?;

        let connect_err = |reason: String| TransportError::Connect {
            addr: addr.to_string(),
            reason,
        };
        let connection = self
            .endpoint
            .connect(socket, server_name(addr))
            .map_err(|e| connect_err(e.to_string()))?
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        tracing::debug!(peer = %addr, remote = %connection.remote_address(), "quic connection established");
        if let Some(old) = self.connection.write().replace(connection) {
            old.close(VarInt::from_u32(0), b"reconnect");
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.connection
            .read()
            .as_ref()
            .map(|c| c.close_reason().is_none())
            .unwrap_or(false)
    }

    fn close(&self) {
        if let Some(connection) = self.connection.write().take() {
            connection.close(VarInt::from_u32(0), b"closed");
        }
    }
}

/// Sends each batch on its own unidirectional stream.
pub struct QuicBatchCall {
    connection: Option<Connection>,
    kind: MessageKind,
    timeout: Duration,
}

impl QuicBatchCall {
    pub fn new(connection: Option<Connection>, kind: MessageKind, timeout: Duration) -> Self {
        Self {
            connection,
            kind,
            timeout,
        }
    }
}

fn network(e: impl std::fmt::Display) -> SendError {
    SendError::Network(e.to_string())
}

async fn write_frame(connection: &Connection, frame: &[u8]) -> Result<(), SendError> {
    let mut stream = connection.open_uni().await.map_err(network)?;
    stream.write_all(frame).await.map_err(network)?;
    stream.finish().map_err(network)?;
    Ok(())
}

#[async_trait]
impl OutboundCall<RoutableRecord> for QuicBatchCall {
    async fn send(&self, batch: Vec<RoutableRecord>) -> Result<(), SendError> {
        let connection = self.connection.as_ref().ok_or(SendError::NotConnected)?;
        let frame = encode_message(&self.kind.wrap(batch))
            .map_err(|e| SendError::Encode(e.to_string()))?;

        match tokio::time::timeout(self.timeout, write_frame(connection, &frame)).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(self.timeout)),
        }
    }
}

/// Builds `QuicBatchCall`s from a channel's current connection.
pub struct QuicCallFactory {
    kind: MessageKind,
    timeout: Duration,
}

impl QuicCallFactory {
    pub fn new(kind: MessageKind, timeout: Duration) -> Self {
        Self { kind, timeout }
    }
}

impl CallFactory<Arc<QuicChannel>, RoutableRecord> for QuicCallFactory {
    fn build(&self, channel: &Arc<QuicChannel>) -> Arc<dyn OutboundCall<RoutableRecord>> {
        tracing::debug!(kind = self.kind.as_str(), "building quic call handle");
        Arc::new(QuicBatchCall::new(channel.connection(), self.kind, self.timeout))
    }
}

/// Node-to-node channels sharing one client endpoint.
pub struct QuicPeerConnector {
    endpoint: Endpoint,
    timeout: Duration,
}

impl QuicPeerConnector {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }
}

impl PeerConnector<Arc<QuicChannel>> for QuicPeerConnector {
    fn channel(&self, _addr: &NodeAddress) -> Arc<QuicChannel> {
        Arc::new(QuicChannel::new(self.endpoint.clone()))
    }

    fn call_factory(&self) -> Arc<dyn CallFactory<Arc<QuicChannel>, RoutableRecord>> {
        Arc::new(QuicCallFactory::new(MessageKind::Forward, self.timeout))
    }
}

/// Skip server certificate verification for self-signed node certificates.
#[derive(Debug)]
struct SkipServerVerification;

#[cfg_attr(coverage_nightly, coverage(off))]
impl quinn::rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<quinn::rustls::client::danger::ServerCertVerified, quinn::rustls::Error> {
        Ok(quinn::rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &quinn::rustls::DigitallySignedStruct,
    ) -> Result<quinn::rustls::client::danger::HandshakeSignatureValid, quinn::rustls::Error> {
        Ok(quinn::rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &quinn::rustls::DigitallySignedStruct,
    ) -> Result<quinn::rustls::client::danger::HandshakeSignatureValid, quinn::rustls::Error> {
        Ok(quinn::rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<quinn::rustls::SignatureScheme> {
        use quinn::rustls::SignatureScheme::*;
        vec![
            ECDSA_NISTP256_SHA256,
            ECDSA_NISTP384_SHA384,
            ED25519,
            RSA_PSS_SHA256,
            RSA_PSS_SHA384,
            RSA_PKCS1_SHA256,
            RSA_PKCS1_SHA384,
        ]
    }
}
