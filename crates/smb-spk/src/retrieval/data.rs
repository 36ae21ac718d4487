//! FTP data connections.
//!
//! The control dialogue asks a [`DataConnector`] for the data channel:
//! in active mode it listens and the server connects back, in passive
//! mode it connects to the address the server announced.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};

/// Opens FTP data channels.
pub trait DataConnector: Send {
    /// The data stream type.
    type Stream: AsyncRead + Unpin + Send;

    /// Start listening for an active-mode transfer and return the address
    /// to advertise with `PORT`.
    fn listen(&mut self) -> impl std::future::Future<Output = io::Result<SocketAddrV4>> + Send;

    /// Accept the server's connection to the listener.
    fn accept(&mut self) -> impl std::future::Future<Output = io::Result<Self::Stream>> + Send;

    /// Connect to the address announced in a passive-mode reply.
    fn connect(
        &mut self,
        addr: SocketAddrV4,
    ) -> impl std::future::Future<Output = io::Result<Self::Stream>> + Send;
}

/// TCP data connections.
#[derive(Debug)]
pub struct TcpConnector {
    local_ip: Option<Ipv4Addr>,
    listener: Option<TcpListener>,
}

impl TcpConnector {
    /// Create a connector that advertises `local_ip` in active mode.
    #[must_use]
    pub const fn new(local_ip: Option<Ipv4Addr>) -> Self {
        Self {
            local_ip,
            listener: None,
        }
    }

    /// Create a connector advertising the local address of `control`.
    ///
    /// Active mode needs an IPv4 control connection; over IPv6 only
    /// passive mode works.
    #[must_use]
    pub fn for_control(control: &TcpStream) -> Self {
        let local_ip = match control.local_addr() {
            Ok(SocketAddr::V4(addr)) => Some(*addr.ip()),
            Ok(SocketAddr::V6(addr)) => addr.ip().to_ipv4_mapped(),
            Err(_) => None,
        };
        Self::new(local_ip)
    }
}

impl DataConnector for TcpConnector {
    type Stream = TcpStream;

    async fn listen(&mut self) -> io::Result<SocketAddrV4> {
        let ip = self.local_ip.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                "active mode needs an IPv4 control connection",
            )
        })?;
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(ip), 0)).await?;
        let port = listener.local_addr()?.port();
        self.listener = Some(listener);
        Ok(SocketAddrV4::new(ip, port))
    }

    async fn accept(&mut self) -> io::Result<TcpStream> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "not listening"))?;
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "data connection accepted");
        Ok(stream)
    }

    async fn connect(&mut self, addr: SocketAddrV4) -> io::Result<TcpStream> {
        self.listener = None;
        TcpStream::connect(addr).await
    }
}

/// Format an address as the `PORT` argument `h1,h2,h3,h4,p1,p2`.
#[must_use]
pub fn port_argument(addr: SocketAddrV4) -> String {
    let [a, b, c, d] = addr.ip().octets();
    let port = addr.port();
    format!("{a},{b},{c},{d},{},{}", port >> 8, port & 0xff)
}

/// Parse the six numbers of a `227` reply into an address.
#[must_use]
pub fn parse_passive<S: AsRef<str>>(fields: &[S]) -> Option<SocketAddrV4> {
    if fields.len() != 6 {
        return None;
    }
    let mut bytes = [0u8; 6];
    for (slot, field) in bytes.iter_mut().zip(fields) {
        *slot = field.as_ref().trim().parse().ok()?;
    }
    let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
    let port = (u16::from(bytes[4]) << 8) | u16::from(bytes[5]);
    Some(SocketAddrV4::new(ip, port))
}
