//! Artifact retrieval over FTP.
//!
//! The control channel is an ordinary [`SessionClient`](crate::session::SessionClient)
//! driven by a stage table; the data channel is opened through a
//! [`DataConnector`] so tests can substitute an in-memory one.

mod data;
mod dialogue;

pub use data::{DataConnector, TcpConnector, parse_passive, port_argument};
pub use dialogue::{Fetch, QUIT_TOKEN, escape_credential, login_table, part_path, run_session};
