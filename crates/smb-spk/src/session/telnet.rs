//! Telnet option negotiation filter.
//!
//! Horizons is reached over a telnet port and opens with option
//! negotiation. The filter strips every IAC sequence from the inbound
//! stream and refuses each offered option, so patterns only ever see the
//! plain text of the session. Sequences may be split across reads.

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    Iac,
    Option(u8),
    Sub,
    SubIac,
}

/// Output of feeding one chunk through the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filtered {
    /// Session text with negotiation removed.
    pub data: Vec<u8>,
    /// Refusals to write back to the remote side.
    pub replies: Vec<u8>,
}

/// Incremental IAC filter.
#[derive(Debug, Clone, Default)]
pub struct TelnetFilter {
    state: State,
}

impl TelnetFilter {
    /// Create a filter in the data state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one inbound chunk.
    #[must_use]
    pub fn feed(&mut self, chunk: &[u8]) -> Filtered {
        let mut out = Filtered {
            data: Vec::with_capacity(chunk.len()),
            replies: Vec::new(),
        };

        for &byte in chunk {
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, b) => {
                    out.data.push(b);
                    State::Data
                }
                (State::Iac, IAC) => {
                    out.data.push(IAC);
                    State::Data
                }
                (State::Iac, cmd @ (WILL | WONT | DO | DONT)) => State::Option(cmd),
                (State::Iac, SB) => State::Sub,
                (State::Iac, _) => State::Data,
                (State::Option(cmd), opt) => {
                    match cmd {
                        DO => out.replies.extend_from_slice(&[IAC, WONT, opt]),
                        WILL => out.replies.extend_from_slice(&[IAC, DONT, opt]),
                        _ => {}
                    }
                    State::Data
                }
                (State::Sub, IAC) => State::SubIac,
                (State::Sub, _) => State::Sub,
                (State::SubIac, SE) => State::Data,
                (State::SubIac, _) => State::Sub,
            };
        }

        out
    }
}
