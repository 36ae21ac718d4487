//! Horizons dialogue and engine behavior over the mock transport.

#![cfg(feature = "mock")]

mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::{horizons, horizons_until_start, request};
use smb_spk::config::{HorizonsConfig, SessionConfig};
use smb_spk::dialog::{DialogueContext, DialogueEngine, Narrow, Stage, StageTable};
use smb_spk::horizons::{self, Generated};
use smb_spk::mock::{MockTransport, Scenario};
use smb_spk::{Abort, FailureReason, Pattern, SessionClient, SpkFormat, SpkRequest};

fn session(scenario: &Scenario) -> (MockTransport, SessionClient<MockTransport>) {
    let transport = MockTransport::from_scenario(scenario);
    let session = SessionClient::new(transport.clone(), SessionConfig::default().telnet(true))
        .with_quit_token("exit");
    (transport, session)
}

async fn generate(
    session: &mut SessionClient<MockTransport>,
    req: &SpkRequest,
) -> Result<Generated, Abort> {
    horizons::run_session(session, req, &HorizonsConfig::default()).await
}

#[tokio::test]
async fn object_id_names_binary_artifact() {
    let (transport, mut session) = session(&horizons("B", "1000003", "wld4711.bsp"));

    let generated = generate(&mut session, &request(SpkFormat::Binary))
        .await
        .unwrap();

    assert_eq!(
        generated,
        Generated {
            remote_filename: "wld4711.bsp".into(),
            local_filename: PathBuf::from("1000003.bsp"),
            format_suffix: "bsp".into(),
            object_id: Some(1_000_003),
        }
    );
    assert_eq!(transport.count_line("exit"), 1);
    assert_eq!(transport.count_line("J2000"), 1);
}

#[tokio::test]
async fn text_format_uses_transfer_suffix() {
    let (_, mut session) = session(&horizons("A", "1000042", "wld4712.xsp"));

    let generated = generate(&mut session, &request(SpkFormat::Text))
        .await
        .unwrap();

    assert_eq!(generated.local_filename, PathBuf::from("1000042.xsp"));
}

#[tokio::test]
async fn output_override_skips_identifier_capture() {
    let (_, mut session) = session(&horizons("21", "1000003", "wld4713.bsp"));
    let mut req = request(SpkFormat::Type21);
    req.output = Some(PathBuf::from("my-body.bsp"));

    let generated = generate(&mut session, &req).await.unwrap();

    assert_eq!(generated.local_filename, PathBuf::from("my-body.bsp"));
    assert_eq!(generated.object_id, None);
}

#[tokio::test]
async fn malformed_identifier_aborts() {
    let (transport, mut session) = session(&horizons("B", "10x3", "wld.bsp"));

    let abort = generate(&mut session, &request(SpkFormat::Binary))
        .await
        .unwrap_err();

    assert_eq!(abort.reason, FailureReason::MalformedCapture);
    assert_eq!(abort.stage, 7);
    assert_eq!(abort.diagnostic.as_deref(), Some("10x3"));
    assert_eq!(transport.count_line("exit"), 1);
}

#[tokio::test]
async fn rejected_elements_report_server_text() {
    let scenario = Scenario::new("bad elements")
        .initial_output("Horizons> ")
        .expect_respond("PAGE", "Horizons> ")
        .expect_respond("##2", "Horizons> ")
        .expect_respond(";", "Input small-body elements : ")
        .expect_respond(
            common::ELEMENTS,
            " ERROR: Cannot interpret element value 'QR=1.21x'\r\nInput small-body elements : ",
        );
    let (transport, mut session) = session(&scenario);

    let abort = generate(&mut session, &request(SpkFormat::Binary))
        .await
        .unwrap_err();

    assert_eq!(abort.reason, FailureReason::ServerReportedInputError);
    assert_eq!(abort.stage, 4);
    assert_eq!(
        abort.diagnostic.as_deref(),
        Some("ERROR: Cannot interpret element value 'QR=1.21x'")
    );
    assert_eq!(transport.count_line("exit"), 1);
}

#[tokio::test(start_paused = true)]
async fn bounded_computation_times_out() {
    let scenario = horizons_until_start("B", "1000003")
        .expect_respond("2024-01-01", "Enter STOP date (YYYY-MM-DD) : ");
    let (transport, mut session) = session(&scenario);
    let config = HorizonsConfig {
        computation_timeout: Some(Duration::from_secs(300)),
        ..HorizonsConfig::default()
    };

    let abort = horizons::run_session(&mut session, &request(SpkFormat::Binary), &config)
        .await
        .unwrap_err();

    assert_eq!(abort.reason, FailureReason::StageTimeout { stage: 13 });
    assert_eq!(transport.count_line("exit"), 1);
}

#[tokio::test]
async fn error_signal_wins_tie_at_same_position() {
    let scenario = Scenario::new("tie").initial_output("Reference frame unknown\r\nok> ");
    let (transport, mut session) = session(&scenario);

    let table = StageTable::new("tie").stage(
        Stage::new("frame")
            .deadline(Some(Duration::from_secs(5)))
            .expect("Reference frame")
            .reply("J2000")
            .error(
                Pattern::regex(r"(?m)^Reference frame unknown\r?\n").unwrap(),
                FailureReason::ServerReportedInputError,
            ),
    );

    let outcome = DialogueEngine::new()
        .run(&mut session, &table, DialogueContext::new())
        .await;

    let abort = outcome.abort().unwrap();
    assert_eq!(abort.reason, FailureReason::ServerReportedInputError);
    assert_eq!(abort.diagnostic.as_deref(), Some("Reference frame unknown"));
    assert_eq!(transport.count_line("J2000"), 0);
}

#[tokio::test]
async fn earlier_match_wins_over_list_order() {
    let scenario = Scenario::new("order").initial_output("first: 17\r\nsecond: 99\r\n");
    let (_, mut session) = session(&scenario);

    let number = |label: &str| Pattern::regex(&format!(r"{label}: (\d+)\s")).unwrap();
    let table = StageTable::new("order").stage(
        Stage::new("pick")
            .deadline(Some(Duration::from_secs(5)))
            .expect(number("second"))
            .capture(1, "value", Narrow::Integer)
            .expect(number("first"))
            .capture(1, "value", Narrow::Integer),
    );

    let ctx = DialogueEngine::new()
        .run(&mut session, &table, DialogueContext::new())
        .await
        .into_result()
        .unwrap();

    assert_eq!(ctx.get_u64("value"), Some(17));
}

#[tokio::test]
async fn captures_are_write_once() {
    let scenario = Scenario::new("twice").initial_output("id: 1\r\nid: 2\r\n");
    let (_, mut session) = session(&scenario);

    let id = || Pattern::regex(r"id: (\d+)\s").unwrap();
    let table = StageTable::new("twice")
        .stage(
            Stage::new("first")
                .deadline(Some(Duration::from_secs(5)))
                .expect(id())
                .capture(1, "id", Narrow::Integer),
        )
        .stage(
            Stage::new("second")
                .deadline(Some(Duration::from_secs(5)))
                .expect(id())
                .capture(1, "id", Narrow::Integer),
        );

    let ctx = DialogueEngine::new()
        .run(&mut session, &table, DialogueContext::new())
        .await
        .into_result()
        .unwrap();

    assert_eq!(ctx.get_u64("id"), Some(1));
}
