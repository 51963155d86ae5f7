//! The tunnel client engine (spec §4.I): connects over TLS, authenticates,
//! and runs the data-plane loop, reconnecting with backoff on failure.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use vpn_core::config::ClientConfig;
use vpn_core::constants::{
    AUTH_TIMEOUT_SECS, CONNECT_TIMEOUT_SECS, KEEPALIVE_TIMEOUT_SECS, PROTOCOL_VERSION,
};
use vpn_core::control;
use vpn_core::packet::validate_ip_packet;
use vpn_core::plugins::DatagramDevice;
use vpn_core::wire::{frame_record, MessageType, StreamBuffer, StreamItem};
use vpn_crypto::kdf::master_key_from_hex;
use vpn_crypto::session::AeadSession;

use crate::error::{Error, Result};
use crate::reconnect::ReconnectController;

/// Collaborators the engine needs from the host environment.
pub struct ClientDeps {
    pub device: Arc<dyn DatagramDevice>,
}

/// Backs `insecure_skip_verify` (spec §4.I). Kept in its own module so the
/// unsafe trust decision is never reached accidentally from the normal
/// trust-anchor path above.
mod danger {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, SignatureScheme};

    #[derive(Debug)]
    pub struct AcceptAnyServerCert;

    impl ServerCertVerifier for AcceptAnyServerCert {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            rustls::crypto::aws_lc_rs::default_provider()
                .signature_verification_algorithms
                .supported_schemes()
        }
    }
}

struct ActiveSession {
    token: String,
    assigned_ip: Ipv4Addr,
    aead: AeadSession,
}

pub struct ClientTunnel {
    config: ClientConfig,
    deps: ClientDeps,
    reconnect: Mutex<ReconnectController>,
}

fn now_unix_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl ClientTunnel {
    pub fn new(config: ClientConfig, deps: ClientDeps) -> Self {
        Self {
            config,
            deps,
            reconnect: Mutex::new(ReconnectController::new()),
        }
    }

    fn build_tls_connector(&self) -> Result<TlsConnector> {
        if self.config.insecure_skip_verify {
            warn!("TLS certificate verification disabled; do not use against an untrusted network");
            let tls_config = rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(danger::AcceptAnyServerCert))
                .with_no_client_auth();
            return Ok(TlsConnector::from(Arc::new(tls_config)));
        }

        let mut roots = RootCertStore::empty();
        if let Some(ca_path) = &self.config.ca_cert_path {
            let bytes = std::fs::read(ca_path)?;
            for cert in rustls_pemfile::certs(&mut bytes.as_slice()) {
                let cert = cert.map_err(|e| Error::tls(e.to_string()))?;
                roots.add(cert).map_err(|e| Error::tls(e.to_string()))?;
            }
        } else {
            for cert in rustls_native_certs::load_native_certs().certs {
                roots.add(cert).map_err(|e| Error::tls(e.to_string()))?;
            }
        }
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(TlsConnector::from(Arc::new(tls_config)))
    }

    /// Connects, authenticates, and runs the session until it ends. Returns
    /// `Ok(())` on a clean disconnect (server- or client-initiated).
    async fn run_once(&self) -> Result<()> {
        let connector = self.build_tls_connector()?;
        let server_name = ServerName::try_from(self.config.server_host.clone())
            .map_err(|e| Error::tls(e.to_string()))?;

        info!(host = %self.config.server_host, port = self.config.server_port, "connecting");
        let tcp = timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            TcpStream::connect((self.config.server_host.as_str(), self.config.server_port)),
        )
        .await
        .map_err(|_| Error::timeout("tcp connect"))??;

        let mut stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::tls(e.to_string()))?;
        debug!("tls handshake complete");

        let session = self.authenticate(&mut stream).await?;
        info!(token = %session.token, ip = %session.assigned_ip, "authenticated");
        self.reconnect.lock().await.on_connected();

        self.session_loop(&mut stream, StreamBuffer::new(), session).await
    }

    async fn authenticate(&self, stream: &mut TlsStream<TcpStream>) -> Result<ActiveSession> {
        let request = control::encode_auth_request(
            &self.config.username,
            &self.config.password,
            PROTOCOL_VERSION,
        )?;
        stream.write_all(&request).await?;

        let mut buf = StreamBuffer::new();
        let mut read_buf = [0u8; 4096];
        let msg = loop {
            if let Some(msg) = buf.extract_control_message()? {
                break msg;
            }
            let n = timeout(
                Duration::from_secs(AUTH_TIMEOUT_SECS),
                stream.read(&mut read_buf),
            )
            .await
            .map_err(|_| Error::timeout("waiting for auth response"))??;
            if n == 0 {
                return Err(Error::Disconnected("connection closed during auth".into()));
            }
            buf.push(&read_buf[..n]);
        };

        match msg.message_type {
            MessageType::AuthSuccess => {
                let success = control::decode_auth_success(&msg)?;
                let master_key = master_key_from_hex(&success.master_key_hex)?;
                let assigned_ip: Ipv4Addr = success
                    .assigned_ip
                    .parse()
                    .map_err(|_| Error::AuthFailed("malformed assigned_ip".into()))?;
                Ok(ActiveSession {
                    token: success.session_token,
                    assigned_ip,
                    aead: AeadSession::new(&master_key)?,
                })
            }
            MessageType::AuthFailure => {
                let failure = control::decode_auth_failure(&msg)?;
                Err(Error::AuthFailed(failure.error_message))
            }
            other => Err(Error::AuthFailed(format!("unexpected response {other:?}"))),
        }
    }

    /// Resolves to nothing as long as `deadline` is `None`, otherwise
    /// sleeps until it; lets [`Self::session_loop`] fold the outstanding
    /// pong deadline into the same `select!` as the rest of the loop.
    async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
        match deadline {
            Some(d) => tokio::time::sleep_until(d).await,
            None => std::future::pending().await,
        }
    }

    async fn session_loop(
        &self,
        stream: &mut TlsStream<TcpStream>,
        mut buf: StreamBuffer,
        mut session: ActiveSession,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.keepalive_interval_secs));
        ticker.tick().await; // first tick fires immediately; consume it
        let mut read_buf = [0u8; 4096];
        // Set when a ping is sent, cleared on the matching pong; if it
        // elapses first the peer is treated as gone (spec §4.I/§5).
        let mut pong_deadline: Option<tokio::time::Instant> = None;

        loop {
            while let Some(item) = buf.extract_next()? {
                match item {
                    StreamItem::Record(record) => match session.aead.open_checked(&record, b"") {
                        Ok(plaintext) => match validate_ip_packet(&plaintext) {
                            Ok(_) => self.deps.device.send(&plaintext).await?,
                            Err(e) => warn!(error = %e, "dropping malformed ip packet"),
                        },
                        Err(e) => warn!(error = %e, "dropping undecryptable record"),
                    },
                    StreamItem::Control(msg) => match msg.message_type {
                        MessageType::Pong => {
                            debug!("pong received");
                            pong_deadline = None;
                        }
                        MessageType::Disconnect => {
                            info!("server requested disconnect");
                            return Ok(());
                        }
                        other => debug!(?other, "ignoring unexpected in-band control message"),
                    },
                }
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let ping = control::encode_ping(now_unix_secs())?;
                    stream.write_all(&ping).await?;
                    pong_deadline = Some(tokio::time::Instant::now() + Duration::from_secs(KEEPALIVE_TIMEOUT_SECS));
                }
                _ = Self::sleep_until_opt(pong_deadline) => {
                    warn!("no pong within keepalive timeout, treating connection as lost");
                    return Err(Error::Disconnected("keepalive timed out waiting for pong".into()));
                }
                res = stream.read(&mut read_buf) => {
                    let n = res?;
                    if n == 0 {
                        return Err(Error::Disconnected("connection closed by server".into()));
                    }
                    buf.push(&read_buf[..n]);
                }
                packet = self.deps.device.recv() => {
                    let packet = packet?;
                    let record = session.aead.seal_next(&packet, b"")?;
                    let framed = frame_record(&record)?;
                    stream.write_all(&framed).await?;
                }
            }
        }
    }

    /// Runs the connect/reconnect loop until reconnect is disabled and the
    /// connection drops, or authentication is rejected outright.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        self.reconnect.lock().await.enable();
        loop {
            self.reconnect.lock().await.mark_connecting();
            match self.run_once().await {
                Ok(()) => info!("session ended cleanly"),
                Err(Error::AuthFailed(reason)) => {
                    warn!(%reason, "authentication rejected, giving up");
                    return Err(Error::AuthFailed(reason));
                }
                Err(e) => warn!(error = %e, "session ended with error"),
            }

            match self.reconnect.lock().await.on_disconnected() {
                Some(delay) => {
                    if !delay.is_zero() {
                        info!(delay_secs = delay.as_secs_f64(), "waiting before reconnect");
                        tokio::time::sleep(delay).await;
                    }
                }
                None => return Ok(()),
            }
        }
    }

    pub async fn disable_reconnect(&self) {
        self.reconnect.lock().await.disable();
    }
}
