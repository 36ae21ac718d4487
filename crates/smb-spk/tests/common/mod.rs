//! Scripted servers shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use smb_spk::mock::{MockConnector, Scenario};
use smb_spk::{SpkFormat, SpkRequest};

pub const EMAIL: &str = "observer@example.org";
pub const ELEMENTS: &str = "EPOCH=2460310.5 EC=.0714 QR=1.21 TP=2460200.1 OM=21.3 W=63.1 IN=5.4";
pub const PAYLOAD: &[u8] = b"DAF/SPK \0\0\0 small-body segment";

pub fn request(format: SpkFormat) -> SpkRequest {
    SpkRequest {
        format,
        object_name: "2024 XR".into(),
        start: "2024-01-01".into(),
        stop: "2024-06-01".into(),
        elements: ELEMENTS.into(),
        email: EMAIL.into(),
        output: None,
    }
}

/// A fresh scratch directory for one test.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("smb-spk-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Horizons up to the format answer, ending with the start-date prompt.
pub fn horizons_until_start(format_code: &str, object_id: &str) -> Scenario {
    Scenario::new("horizons")
        .initial_output_chunks(["\r\n JPL Horizons\r\n", "Horizons> "])
        .expect_respond("PAGE", "Horizons> ")
        .expect_respond("##2", "Horizons> ")
        .expect_respond(";", "Input small-body elements (EC, QR, TP, ...) : ")
        .expect_respond(ELEMENTS, "Reference frame [J2000/B1950] : ")
        .expect_respond("J2000", "Optional object name : ")
        .expect_respond("2024 XR", "Select ... [E]phemeris, [S]PK : ")
        .expect_respond_chunks(
            "S",
            [
                "\r\n Assigned SPK object ID:  ".to_string(),
                format!("{object_id}\r\n\r\n"),
                "Enter your Internet e-mail address : ".to_string(),
            ],
        )
        .expect_respond(EMAIL, "Confirm e-mail address [yes(<cr>),no] : ")
        .expect_respond("yes", "SPK file format [A]SCII transfer, [1] type 1, [21] type 21, [B]inary : ")
        .expect_respond(format_code, "Enter START date (YYYY-MM-DD) : ")
}

/// Horizons up to the start date, ending with the stop-date prompt.
pub fn horizons_until_stop(format_code: &str, object_id: &str) -> Scenario {
    horizons_until_start(format_code, object_id)
        .expect_respond("2024-01-01", "Enter STOP date (YYYY-MM-DD) : ")
}

/// A complete Horizons session that announces `remote`.
pub fn horizons(format_code: &str, object_id: &str, remote: &str) -> Scenario {
    horizons_until_stop(format_code, object_id)
        .expect_respond_chunks(
            "2024-06-01",
            ["\r\n Computing ...\r\n", "Add more objects to file [YES,NO] : "],
        )
        .expect_respond(
            "NO",
            format!("\r\n File type: SPK\r\n File name : {remote}\r\n\r\nHorizons> "),
        )
}

/// FTP login through `CWD`.
pub fn ftp_login(transfer_type: &str) -> Scenario {
    Scenario::new("ftp")
        .initial_output("220-Welcome\r\n220 ssd FTP server ready.\r\n")
        .expect_respond("USER anonymous", "331 Please specify the password.\r\n")
        .expect_respond(format!("PASS {EMAIL}"), "230 Login successful.\r\n")
        .expect_respond(format!("TYPE {transfer_type}"), "200 Type set.\r\n")
        .expect_respond("CWD pub/ssd", "250 Directory successfully changed.\r\n")
}

/// A complete active-mode FTP session fetching `remote`.
pub fn ftp(transfer_type: &str, remote: &str) -> Scenario {
    ftp_login(transfer_type)
        .expect_respond(MockConnector::port_command(), "200 PORT command successful.\r\n")
        .expect_respond_chunks(
            format!("RETR {remote}"),
            ["150 Opening data connection.\r\n", "226 Transfer complete.\r\n"],
        )
}
