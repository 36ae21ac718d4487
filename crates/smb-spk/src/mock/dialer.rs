//! Dialer handing out scripted transports.

use std::collections::VecDeque;
use std::io;

use super::connector::MockConnector;
use super::transport::MockTransport;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::run::Dialer;

/// A [`Dialer`] that returns queued mock transports in order.
///
/// Dialing with an empty queue fails with a refused connection.
#[derive(Debug, Default)]
pub struct MockDialer {
    controls: VecDeque<MockTransport>,
    connector: MockConnector,
    dialed: Vec<String>,
}

impl MockDialer {
    /// Create a dialer whose data connections serve `connector`.
    #[must_use]
    pub fn new(connector: MockConnector) -> Self {
        Self {
            connector,
            ..Self::default()
        }
    }

    /// Queue the transport returned by the next dial.
    #[must_use]
    pub fn then(mut self, transport: MockTransport) -> Self {
        self.controls.push_back(transport);
        self
    }

    /// Endpoints dialed so far.
    #[must_use]
    pub fn dialed(&self) -> &[String] {
        &self.dialed
    }
}

impl Dialer for MockDialer {
    type Control = MockTransport;
    type Data = MockConnector;

    async fn dial(&mut self, endpoint: &str, _config: &SessionConfig) -> Result<MockTransport> {
        self.dialed.push(endpoint.to_string());
        self.controls.pop_front().ok_or_else(|| {
            SessionError::connect(
                endpoint,
                io::Error::new(io::ErrorKind::ConnectionRefused, "no scripted server"),
            )
        })
    }

    fn data_connector(&mut self, _control: &MockTransport) -> MockConnector {
        self.connector.clone()
    }
}
