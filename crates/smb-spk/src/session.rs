//! Session management.
//!
//! A session is the single connection a dialogue talks over. The client
//! is generic over its transport so dialogues run unchanged against a TCP
//! stream or the scripted mock transport.

mod client;
mod telnet;

pub use client::{SessionClient, connect_tcp};
pub use telnet::{Filtered, TelnetFilter};
