//! Framed IRC client transport over TCP and TLS.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream as ClientTlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_util::codec::Framed;
use tracing::warn;

use crate::error::ProtocolError;
use crate::irc::IrcCodec;
use crate::message::Message;

/// Line limit for the client codec.
///
/// Trackers routinely blow past the 512-byte RFC limit on announce lines,
/// so the client transport frames at a more forgiving cap.
const CLIENT_MAX_LINE_LEN: usize = 4096;

/// IRC transport over plain TCP or client-side TLS.
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// Plain TCP transport.
    Tcp {
        framed: Framed<TcpStream, IrcCodec>,
    },
    /// TLS-encrypted transport.
    Tls {
        framed: Framed<ClientTlsStream<TcpStream>, IrcCodec>,
    },
}

impl Transport {
    /// Connect to an IRC server, optionally wrapping the stream in TLS.
    ///
    /// TLS validation uses the platform's native root store.
    pub async fn connect(host: &str, port: u16, tls: bool) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect((host, port)).await?;

        if let Err(e) = Self::enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }

        if !tls {
            return Ok(Self::Tcp {
                framed: Framed::new(stream, IrcCodec::with_max_len(CLIENT_MAX_LINE_LEN)),
            });
        }

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| ProtocolError::InvalidServerName(host.to_string()))?;
        let connector = TlsConnector::from(tls_client_config());
        let tls_stream = connector.connect(server_name, stream).await?;

        Ok(Self::Tls {
            framed: Framed::new(tls_stream, IrcCodec::with_max_len(CLIENT_MAX_LINE_LEN)),
        })
    }

    fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
        use socket2::{SockRef, TcpKeepalive};
        use std::time::Duration;

        let sock = SockRef::from(stream);
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(120))
            .with_interval(Duration::from_secs(30));

        sock.set_tcp_keepalive(&keepalive)?;
        Ok(())
    }

    /// Send a message and flush it to the socket.
    pub async fn send(&mut self, msg: Message) -> Result<(), ProtocolError> {
        match self {
            Self::Tcp { framed } => framed.send(msg).await,
            Self::Tls { framed } => framed.send(msg).await,
        }
    }

    /// Read the next message. `None` means the peer closed the stream.
    pub async fn next(&mut self) -> Option<Result<Message, ProtocolError>> {
        match self {
            Self::Tcp { framed } => framed.next().await,
            Self::Tls { framed } => framed.next().await,
        }
    }
}

/// Shared TLS client configuration built from native roots.
fn tls_client_config() -> Arc<ClientConfig> {
    use std::sync::OnceLock;
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

    CONFIG
        .get_or_init(|| {
            let mut roots = RootCertStore::empty();
            let result = rustls_native_certs::load_native_certs();
            for err in &result.errors {
                warn!("error loading native root certificate: {}", err);
            }
            for cert in result.certs {
                if let Err(e) = roots.add(cert) {
                    warn!("rejected native root certificate: {}", e);
                }
            }

            Arc::new(
                ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth(),
            )
        })
        .clone()
}
