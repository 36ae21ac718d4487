//! Mock servers for testing dialogues.
//!
//! [`MockTransport`] plays the server side of a [`Scenario`] over an
//! in-memory stream; [`MockConnector`] stands in for FTP data
//! connections and [`MockDialer`] hands both to a full run.
//!
//! ```rust
//! use smb_spk::mock::{MockTransport, Scenario};
//!
//! let scenario = Scenario::new("greeting")
//!     .initial_output("Horizons> ")
//!     .expect_respond("PAGE", "Horizons> ");
//! let transport = MockTransport::from_scenario(&scenario);
//! assert!(transport.written_lines().is_empty());
//! ```

mod connector;
mod dialer;
mod scenario;
mod transport;

pub use connector::{MOCK_DATA_ADDR, MockConnector};
pub use dialer::MockDialer;
pub use scenario::{Scenario, ScenarioStep};
pub use transport::MockTransport;
