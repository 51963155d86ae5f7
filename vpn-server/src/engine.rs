//! The tunnel server engine (spec §4.D-G): accepts TLS connections,
//! authenticates clients, and runs the data-plane loop for each session.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use vpn_core::config::ServerConfig;
use vpn_core::constants::{
    CONNECT_TIMEOUT_SECS, EVICTION_INTERVAL_SECS, SESSION_IDLE_TIMEOUT_SECS, SESSION_TTL_HOURS,
    STATS_LOG_INTERVAL_SECS,
};
use vpn_core::control;
use vpn_core::error::ErrorCode;
use vpn_core::packet::check_source_matches;
use vpn_core::plugins::{DatagramDevice, NetworkPolicy, UserDirectory};
use vpn_core::wire::{frame_record, MessageType, StreamBuffer, StreamItem};
use vpn_crypto::kdf::{generate_master_key, master_key_to_hex, verify_password};
use vpn_crypto::session::AeadSession;

use crate::allocator::{generate_session_token, IpAllocator};
use crate::errors::{Result, ServerError};
use crate::registry::SessionRegistry;
use crate::session::ServerSession;

/// Collaborators the engine needs from the host environment, gathered so
/// `TunnelServer::new` takes one argument instead of four.
pub struct ServerDeps {
    pub directory: Arc<dyn UserDirectory>,
    pub device: Arc<dyn DatagramDevice>,
    pub policy: Arc<dyn NetworkPolicy>,
}

struct AuthenticatedSession {
    session_id: String,
    token: String,
    user_id: String,
    assigned_ip: Ipv4Addr,
    master_key: [u8; 32],
}

pub struct TunnelServer {
    config: ServerConfig,
    deps: ServerDeps,
    registry: Arc<SessionRegistry>,
    ip_pool: Arc<Mutex<IpAllocator>>,
    shutdown: tokio::sync::broadcast::Sender<()>,
}

fn now_unix_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl TunnelServer {
    pub fn new(config: ServerConfig, deps: ServerDeps) -> Self {
        let base = config
            .virtual_network_base()
            .map(|a| [a.octets()[0], a.octets()[1], a.octets()[2]])
            .unwrap_or([10, 8, 0]);
        let (shutdown, _) = tokio::sync::broadcast::channel(1);
        Self {
            config,
            deps,
            registry: Arc::new(SessionRegistry::new()),
            ip_pool: Arc::new(Mutex::new(IpAllocator::new(base))),
            shutdown,
        }
    }

    /// Background task 1 (spec §4.G): every [`EVICTION_INTERVAL_SECS`],
    /// evict sessions idle for longer than [`SESSION_IDLE_TIMEOUT_SECS`] or
    /// older than [`SESSION_TTL_HOURS`], releasing each evicted session's
    /// virtual IP back to the allocator (invariant 3) since the session's
    /// own connection task never runs its normal teardown path here.
    async fn run_eviction_task(
        registry: Arc<SessionRegistry>,
        ip_pool: Arc<Mutex<IpAllocator>>,
        policy: Arc<dyn NetworkPolicy>,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(Duration::from_secs(EVICTION_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let freed_ips = registry
                        .cleanup_inactive(
                            Duration::from_secs(SESSION_IDLE_TIMEOUT_SECS),
                            Duration::from_secs(SESSION_TTL_HOURS * 3600),
                        )
                        .await;
                    if !freed_ips.is_empty() {
                        info!(evicted = freed_ips.len(), "background sweep evicted idle/expired sessions");
                        let mut pool = ip_pool.lock().await;
                        for ip in freed_ips {
                            pool.release(ip);
                            policy.on_session_down(ip).await.ok();
                        }
                    }
                }
                _ = shutdown.recv() => return,
            }
        }
    }

    /// Background task 2 (spec §4.G): every [`STATS_LOG_INTERVAL_SECS`], log
    /// aggregate traffic statistics across all active sessions.
    async fn run_stats_task(registry: Arc<SessionRegistry>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(STATS_LOG_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sessions = registry.all();
                    let mut records_sent = 0u64;
                    let mut records_received = 0u64;
                    let mut replay_rejections = 0u64;
                    for session in &sessions {
                        let stats = session.lock().await.statistics();
                        records_sent += stats.records_sent;
                        records_received += stats.records_received;
                        replay_rejections += stats.replay_rejections;
                    }
                    info!(
                        active_sessions = sessions.len(),
                        records_sent,
                        records_received,
                        replay_rejections,
                        "aggregate session statistics"
                    );
                }
                _ = shutdown.recv() => return,
            }
        }
    }

    fn build_tls_acceptor(&self) -> Result<TlsAcceptor> {
        let cert_bytes = std::fs::read(&self.config.tls.cert_path)?;
        let key_bytes = std::fs::read(&self.config.tls.key_path)?;

        let certs = rustls_pemfile::certs(&mut cert_bytes.as_slice())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ServerError::tls(e.to_string()))?;
        let key = rustls_pemfile::private_key(&mut key_bytes.as_slice())
            .map_err(|e| ServerError::tls(e.to_string()))?
            .ok_or_else(|| ServerError::tls("no private key found"))?;

        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| ServerError::tls(e.to_string()))?;

        Ok(TlsAcceptor::from(Arc::new(tls_config)))
    }

    /// Binds the listening socket and accepts connections until the process
    /// is asked to shut down (spec §4.G: listener, background tasks,
    /// shutdown). Each connection is handled on its own task.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let acceptor = self.build_tls_acceptor()?;
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        info!(addr = %listener.local_addr()?, "tunnel server listening");

        let eviction_task = tokio::spawn(Self::run_eviction_task(
            self.registry.clone(),
            self.ip_pool.clone(),
            self.deps.policy.clone(),
            self.shutdown.subscribe(),
        ));
        let stats_task = tokio::spawn(Self::run_stats_task(self.registry.clone(), self.shutdown.subscribe()));

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr) = accepted?;
                    let acceptor = acceptor.clone();
                    let server = self.clone();
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => {
                                if let Err(e) = server.handle_connection(tls_stream).await {
                                    warn!(%peer_addr, error = %e, "connection ended with error");
                                }
                            }
                            Err(e) => warn!(%peer_addr, error = %e, "tls handshake failed"),
                        }
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received, closing listener and active sessions");
                    let _ = self.shutdown.send(());
                    let _ = eviction_task.await;
                    let _ = stats_task.await;
                    return Ok(());
                }
            }
        }
    }

    async fn handle_connection<S>(self: Arc<Self>, mut stream: tokio_rustls::server::TlsStream<S>) -> Result<()>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let mut buf = StreamBuffer::new();
        let mut read_buf = [0u8; 4096];

        // §4.G step 1 / §5: a client that never sends an AuthRequest must
        // not tie up a handler slot indefinitely.
        let auth_msg = timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS), async {
            loop {
                if let Some(msg) = buf.extract_control_message()? {
                    return Ok(msg);
                }
                let n = stream.read(&mut read_buf).await?;
                if n == 0 {
                    return Err(ServerError::AuthFailed("connection closed before auth".into()));
                }
                buf.push(&read_buf[..n]);
            }
        })
        .await
        .map_err(|_| ServerError::timeout("waiting for AuthRequest"))??;

        if auth_msg.message_type != MessageType::AuthRequest {
            let framed = control::encode_error(ErrorCode::InvalidMessage.code(), "expected AuthRequest")?;
            stream.write_all(&framed).await?;
            return Err(ServerError::AuthFailed("first message was not AuthRequest".into()));
        }

        let request = control::decode_auth_request(&auth_msg)?;
        let authed = match self.authenticate(&request.username, &request.password).await {
            Ok(authed) => authed,
            Err(e) => {
                let framed = control::encode_auth_failure(e.auth_failure_code().code(), &e.to_string())?;
                stream.write_all(&framed).await?;
                return Err(e);
            }
        };

        let reply = control::encode_auth_success(
            &authed.token,
            &authed.assigned_ip.to_string(),
            &master_key_to_hex(&authed.master_key),
        )?;
        stream.write_all(&reply).await?;

        self.deps.policy.on_session_up(authed.assigned_ip).await?;
        let shared = self.registry.insert(ServerSession::new(
            authed.session_id,
            authed.token.clone(),
            authed.user_id,
            authed.assigned_ip,
            AeadSession::new(&authed.master_key)?,
        ))?;

        info!(token = %authed.token, ip = %authed.assigned_ip, "session established");
        let result = self
            .data_plane_loop(&mut stream, buf, shared.clone(), self.shutdown.subscribe())
            .await;

        self.registry.remove(&authed.token);
        self.ip_pool.lock().await.release(authed.assigned_ip);
        self.deps.policy.on_session_down(authed.assigned_ip).await.ok();
        result
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthenticatedSession> {
        let record = self
            .deps
            .directory
            .find(username)
            .await?
            .ok_or_else(|| ServerError::AuthFailed("unknown user".into()))?;

        if !record.enabled {
            return Err(ServerError::AccountDisabled(record.user_id));
        }
        if !verify_password(password, &record.password_hash).unwrap_or(false) {
            return Err(ServerError::AuthFailed("invalid credentials".into()));
        }
        if self.registry.active_session_count_for_user(&record.user_id) >= record.max_sessions as usize {
            return Err(ServerError::SessionLimitReached(record.user_id));
        }

        let assigned_ip = self.ip_pool.lock().await.allocate()?;
        Ok(AuthenticatedSession {
            session_id: format!("{username}-{}", generate_session_token()),
            token: generate_session_token(),
            user_id: record.user_id,
            assigned_ip,
            master_key: generate_master_key(),
        })
    }

    async fn data_plane_loop<S>(
        &self,
        stream: &mut tokio_rustls::server::TlsStream<S>,
        mut buf: StreamBuffer,
        session: crate::registry::SharedSession,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> Result<()>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let idle_timeout = Duration::from_secs(SESSION_IDLE_TIMEOUT_SECS);
        let mut read_buf = [0u8; 4096];

        loop {
            while let Some(item) = buf.extract_next()? {
                match item {
                    StreamItem::Record(record) => {
                        let plaintext = {
                            let mut locked = session.lock().await;
                            locked.touch();
                            match locked.aead.open_checked(&record, b"") {
                                Ok(p) => p,
                                Err(e) => {
                                    warn!(error = %e, "dropping undecryptable record");
                                    continue;
                                }
                            }
                        };
                        let assigned_ip = session.lock().await.assigned_ip;
                        if let Err(e) = check_source_matches(&plaintext, assigned_ip) {
                            warn!(error = %e, "dropping spoofed-source packet");
                            continue;
                        }
                        self.deps.device.send(&plaintext).await?;
                        debug!(ip = %assigned_ip, "forwarded packet to device");
                    }
                    StreamItem::Control(msg) => match msg.message_type {
                        MessageType::Ping => {
                            session.lock().await.touch();
                            let ping = control::decode_ping(&msg)?;
                            let pong = control::encode_pong(ping.timestamp, now_unix_secs())?;
                            stream.write_all(&pong).await?;
                        }
                        MessageType::Disconnect => {
                            info!("client requested disconnect");
                            session.lock().await.close("client disconnect");
                            return Ok(());
                        }
                        other => {
                            debug!(?other, "ignoring unexpected in-band control message");
                        }
                    },
                }
            }

            if session.lock().await.is_idle(idle_timeout) {
                info!("session idle timeout reached, closing");
                session.lock().await.close("idle timeout");
                return Ok(());
            }

            let n = tokio::select! {
                res = stream.read(&mut read_buf) => res?,
                packet = self.deps.device.recv() => {
                    let packet = packet?;
                    let record = {
                        let mut locked = session.lock().await;
                        locked.touch();
                        locked.aead.seal_next(&packet, b"")?
                    };
                    let framed = frame_record(&record)?;
                    stream.write_all(&framed).await?;
                    continue;
                }
                _ = shutdown.recv() => {
                    info!("server shutting down, closing session");
                    let framed = control::encode_disconnect("server shutting down")?;
                    stream.write_all(&framed).await.ok();
                    session.lock().await.close("server shutdown");
                    return Ok(());
                }
            };
            if n == 0 {
                session.lock().await.close("peer closed connection");
                return Ok(());
            }
            buf.push(&read_buf[..n]);
        }
    }
}
