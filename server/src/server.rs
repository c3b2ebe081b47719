//! Accept loops and per-connection task management.

use std::fs;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tracing::{error, info, warn};

use mimic_common::charset::CharacterSet;
use mimic_common::config::ServerConfig;
use mimic_common::err::{ServerError, SqlResult};
use mimic_protocol::constants::CapabilityFlags;
use mimic_protocol::packets::ErrPacket;
use mimic_protocol::stream::PacketStream;

use crate::auth::{AllowAllIdentityProvider, IdentityProvider};
use crate::connection::Connection;
use crate::control::Control;
use crate::session::Session;

pub type SessionFactory = Arc<dyn Fn() -> Box<dyn Session> + Send + Sync>;

/// The server: a session factory, an identity provider, and the shared
/// control plane.
pub struct MysqlServer {
    config: ServerConfig,
    identity: Arc<dyn IdentityProvider>,
    session_factory: SessionFactory,
    control: Arc<Control>,
    tls: Option<tokio_native_tls::TlsAcceptor>,
}

impl MysqlServer {
    pub fn new<S, F>(session_factory: F) -> SqlResult<Self>
    where
        S: Session + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self::with_config(session_factory, ServerConfig::default())
    }

    pub fn with_config<S, F>(session_factory: F, config: ServerConfig) -> SqlResult<Self>
    where
        S: Session + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let tls = build_tls_acceptor(&config)?;
        Ok(MysqlServer {
            control: Arc::new(Control::new(config.server_id)),
            config,
            identity: Arc::new(AllowAllIdentityProvider),
            session_factory: Arc::new(move || Box::new(session_factory()) as Box<dyn Session>),
            tls,
        })
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn control(&self) -> Arc<Control> {
        self.control.clone()
    }

    /// Serve the configured TCP address (and unix socket when set) until
    /// the task is cancelled.
    pub async fn serve(&self) -> SqlResult<()> {
        let address = format!("{}:{}", self.config.bind, self.config.port);
        let listener = TcpListener::bind(&address).await?;
        info!("listening on {}", address);

        match &self.config.socket {
            Some(path) => {
                let unix = UnixListener::bind(path)?;
                info!("listening on unix socket {}", path);
                tokio::try_join!(self.serve_on(listener), self.serve_unix(unix))?;
            }
            None => self.serve_on(listener).await?,
        }
        Ok(())
    }

    pub async fn serve_on(&self, listener: TcpListener) -> SqlResult<()> {
        loop {
            let (socket, peer) = listener.accept().await?;
            socket.set_nodelay(true).ok();
            info!("accepted connection from {}", peer);
            self.spawn_connection(socket);
        }
    }

    pub async fn serve_unix(&self, listener: UnixListener) -> SqlResult<()> {
        loop {
            let (socket, _) = listener.accept().await?;
            self.spawn_connection(socket);
        }
    }

    fn spawn_connection<T>(&self, io: T)
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let identity = self.identity.clone();
        let control = self.control.clone();
        let session = (self.session_factory)();
        let config = self.config.clone();
        let tls = self.tls.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(io, session, identity, control, config, tls).await {
                warn!("connection ended with error: {}", e);
            }
        });
    }
}

/// Run one client connection to completion. Public so tests and embedders
/// can drive arbitrary transports (e.g. an in-memory duplex).
pub async fn handle_connection<T>(
    io: T,
    session: Box<dyn Session>,
    identity: Arc<dyn IdentityProvider>,
    control: Arc<Control>,
    config: ServerConfig,
    tls: Option<tokio_native_tls::TlsAcceptor>,
) -> SqlResult<()>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (connection_id, kill) = match control.add() {
        Ok(added) => added,
        Err(e) => {
            // Registry full: refuse with CON_COUNT_ERROR before closing.
            let mut stream = PacketStream::new(io);
            let packet = ErrPacket::from_error(&e)
                .serialize(CapabilityFlags::empty(), CharacterSet::Utf8mb4);
            stream.write_packet(&packet);
            let _ = stream.flush().await;
            return Err(e);
        }
    };

    let result = async {
        let mut connection = Connection::new(
            io,
            session,
            identity,
            control.clone(),
            kill,
            connection_id,
            &config,
            tls,
        )?;
        connection.run().await
    }
    .await;

    control.remove(connection_id);
    if let Err(e) = &result {
        match e {
            ServerError::ConnectionClosed => {}
            other => error!("connection {} failed: {}", connection_id, other),
        }
    }
    result
}

fn build_tls_acceptor(config: &ServerConfig) -> SqlResult<Option<tokio_native_tls::TlsAcceptor>> {
    let tls = match &config.tls {
        Some(tls) => tls,
        None => return Ok(None),
    };
    let bundle = fs::read(&tls.identity_path)?;
    let identity = native_tls::Identity::from_pkcs12(&bundle, &tls.identity_password)
        .map_err(|e| ServerError::Tls(e.to_string()))?;
    let acceptor = native_tls::TlsAcceptor::new(identity)
        .map_err(|e| ServerError::Tls(e.to_string()))?;
    Ok(Some(tokio_native_tls::TlsAcceptor::from(acceptor)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::session::NullSession;

    #[test]
    fn test_server_construction() {
        let server = MysqlServer::new(|| NullSession).unwrap();
        assert!(server.control().is_empty());
    }

    #[test]
    fn test_fixed_server_id() {
        let config = ServerConfig {
            server_id: Some(99),
            ..ServerConfig::default()
        };
        let server = MysqlServer::with_config(|| NullSession, config).unwrap();
        assert_eq!(99, server.control().server_id());
    }
}
