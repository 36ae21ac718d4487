//! Recorded transcripts replay to the same result however the received
//! text is split into reads.

#![cfg(feature = "mock")]

mod common;

use common::{horizons, request};
use proptest::prelude::*;
use smb_spk::config::{HorizonsConfig, SessionConfig};
use smb_spk::horizons::{self, Generated};
use smb_spk::mock::MockTransport;
use smb_spk::transcript::{EventKind, Recorder, Transcript, TranscriptEvent};
use smb_spk::{Abort, SessionClient, SpkFormat};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn record() -> (Transcript, Result<Generated, Abort>) {
    let transport = MockTransport::from_scenario(&horizons("B", "1000003", "wld9.bsp"));
    let mut session = SessionClient::new(transport, SessionConfig::default())
        .with_quit_token("exit")
        .with_recorder(Recorder::new());
    let result =
        horizons::run_session(&mut session, &request(SpkFormat::Binary), &HorizonsConfig::default())
            .await;
    (session.take_transcript().unwrap(), result)
}

async fn replay(transcript: &Transcript) -> Result<Generated, Abort> {
    let mut session = SessionClient::new(MockTransport::from_transcript(transcript), SessionConfig::default())
        .with_quit_token("exit");
    horizons::run_session(&mut session, &request(SpkFormat::Binary), &HorizonsConfig::default()).await
}

/// Split every received event into pieces sized by `cuts`, in turn.
fn rechunk(transcript: &Transcript, cuts: &[usize]) -> Transcript {
    let mut sizes = cuts.iter().copied().cycle();
    let mut out = Transcript::new();
    for event in &transcript.events {
        if event.kind != EventKind::Received {
            out.push(event.clone());
            continue;
        }
        let mut rest = event.data.as_str();
        while !rest.is_empty() {
            let mut n = sizes.next().unwrap_or(1).clamp(1, rest.len());
            while !rest.is_char_boundary(n) {
                n += 1;
            }
            let (head, tail) = rest.split_at(n);
            out.push(TranscriptEvent {
                elapsed_ms: event.elapsed_ms,
                kind: EventKind::Received,
                data: head.to_string(),
            });
            rest = tail;
        }
    }
    out
}

#[test]
fn recording_round_trips_through_ndjson() {
    let (transcript, result) = runtime().block_on(record());
    assert!(result.is_ok());
    assert!(transcript.sent().any(|line| line == "exit"));

    let restored = Transcript::from_ndjson(&transcript.to_ndjson().unwrap()).unwrap();
    assert_eq!(restored, transcript);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn replay_is_idempotent(cuts in prop::collection::vec(1usize..32, 1..6)) {
        let rt = runtime();
        let (transcript, recorded) = rt.block_on(record());
        let rechunked = rechunk(&transcript, &cuts);
        prop_assert_eq!(rechunked.received_text(), transcript.received_text());

        let first = rt.block_on(replay(&rechunked));
        let second = rt.block_on(replay(&rechunked));
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, recorded);
    }
}
