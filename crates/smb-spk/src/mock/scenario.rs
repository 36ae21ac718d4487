//! Mock scenarios for testing dialogues.
//!
//! A scenario is the script of a fake server: text it prints on connect,
//! then for each line the client is expected to send, the text printed in
//! reply. Replies can be split into explicit chunks to exercise matches
//! that span reads.

use crate::transcript::{EventKind, Transcript};

/// A step in a mock scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioStep {
    /// When the client sends `line`, print `chunks` in order.
    Respond {
        /// The exact line expected, without its terminator.
        line: String,
        /// Output chunks, each delivered by a separate read.
        chunks: Vec<String>,
    },
    /// Close the stream as soon as the previous step has fired.
    Eof,
}

/// A complete mock scenario.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    name: String,
    initial: Vec<String>,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Get the scenario name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output printed as soon as the client connects.
    #[must_use]
    pub fn initial_output(mut self, output: impl Into<String>) -> Self {
        self.initial.push(output.into());
        self
    }

    /// Initial output delivered as separate chunks.
    #[must_use]
    pub fn initial_output_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial.extend(chunks.into_iter().map(Into::into));
        self
    }

    /// When the client sends `line`, print `response`.
    #[must_use]
    pub fn expect_respond(self, line: impl Into<String>, response: impl Into<String>) -> Self {
        self.expect_respond_chunks(line, [response.into()])
    }

    /// When the client sends `line`, print `chunks` one read at a time.
    #[must_use]
    pub fn expect_respond_chunks<I, S>(mut self, line: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps.push(ScenarioStep::Respond {
            line: line.into(),
            chunks: chunks.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Close the stream after the previous step.
    #[must_use]
    pub fn eof(mut self) -> Self {
        self.steps.push(ScenarioStep::Eof);
        self
    }

    /// Output printed on connect.
    #[must_use]
    pub fn initial(&self) -> &[String] {
        &self.initial
    }

    /// Get the steps.
    #[must_use]
    pub fn steps(&self) -> &[ScenarioStep] {
        &self.steps
    }

    /// Rebuild the server side of a recorded dialogue.
    ///
    /// Text received before the first sent line becomes the initial
    /// output; text received after each sent line becomes that line's
    /// response. Chunk boundaries are preserved.
    #[must_use]
    pub fn from_transcript(name: impl Into<String>, transcript: &Transcript) -> Self {
        let mut scenario = Self::new(name);
        for event in &transcript.events {
            match event.kind {
                EventKind::Received => match scenario.steps.last_mut() {
                    Some(ScenarioStep::Respond { chunks, .. }) => chunks.push(event.data.clone()),
                    Some(ScenarioStep::Eof) => {}
                    None => scenario.initial.push(event.data.clone()),
                },
                EventKind::Sent => scenario.steps.push(ScenarioStep::Respond {
                    line: event.data.clone(),
                    chunks: Vec::new(),
                }),
                EventKind::Eof => scenario.steps.push(ScenarioStep::Eof),
            }
        }
        scenario
    }
}
