//! In-memory FTP data connections.

use std::io::{self, Cursor};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::retrieval::{DataConnector, port_argument};

/// Address advertised by [`MockConnector::listen`](DataConnector::listen).
pub const MOCK_DATA_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 20_020);

#[derive(Debug, Default)]
struct ConnectorState {
    payload: Vec<u8>,
    listening: bool,
    listens: usize,
    accepts: usize,
    connects: Vec<SocketAddrV4>,
    refuse_connects: bool,
}

/// A data connector that serves a fixed payload.
///
/// Clones share state, like [`MockTransport`](super::MockTransport).
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    /// Serve `payload` on every data connection.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        let state = ConnectorState {
            payload: payload.into(),
            ..ConnectorState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Refuse passive-mode connections.
    #[must_use]
    pub fn refusing_connects(self) -> Self {
        self.lock().refuse_connects = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ConnectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The `PORT` command line the client sends in active mode.
    #[must_use]
    pub fn port_command() -> String {
        format!("PORT {}", port_argument(MOCK_DATA_ADDR))
    }

    /// Number of active-mode listens.
    #[must_use]
    pub fn listens(&self) -> usize {
        self.lock().listens
    }

    /// Number of accepted active-mode connections.
    #[must_use]
    pub fn accepts(&self) -> usize {
        self.lock().accepts
    }

    /// Addresses passed to passive-mode connects.
    #[must_use]
    pub fn connects(&self) -> Vec<SocketAddrV4> {
        self.lock().connects.clone()
    }
}

impl DataConnector for MockConnector {
    type Stream = Cursor<Vec<u8>>;

    async fn listen(&mut self) -> io::Result<SocketAddrV4> {
        let mut state = self.lock();
        state.listening = true;
        state.listens += 1;
        Ok(MOCK_DATA_ADDR)
    }

    async fn accept(&mut self) -> io::Result<Self::Stream> {
        let mut state = self.lock();
        if !state.listening {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "not listening"));
        }
        state.listening = false;
        state.accepts += 1;
        Ok(Cursor::new(state.payload.clone()))
    }

    async fn connect(&mut self, addr: SocketAddrV4) -> io::Result<Self::Stream> {
        let mut state = self.lock();
        state.listening = false;
        state.connects.push(addr);
        if state.refuse_connects {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        }
        Ok(Cursor::new(state.payload.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn serves_payload_after_listen() {
        let mut connector = MockConnector::new(b"SPK".to_vec());
        assert!(connector.accept().await.is_err());

        assert_eq!(connector.listen().await.unwrap(), MOCK_DATA_ADDR);
        let mut stream = connector.accept().await.unwrap();
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"SPK");
        assert_eq!(connector.accepts(), 1);
    }

    #[tokio::test]
    async fn records_passive_connects() {
        let tracked = MockConnector::new(Vec::new()).refusing_connects();
        let mut connector = tracked.clone();
        assert!(connector.connect(MOCK_DATA_ADDR).await.is_err());
        assert_eq!(tracked.connects(), vec![MOCK_DATA_ADDR]);
    }

    #[test]
    fn port_command_encodes_address() {
        assert_eq!(MockConnector::port_command(), "PORT 127,0,0,1,78,52");
    }
}
