//! The Horizons SPK generation dialogue.
//!
//! Fifteen stages walk the Horizons telnet interface from the greeting
//! to the announcement of the generated file's name. The dialogue binds
//! the server-assigned object ID (unless the caller chose the local file
//! name) and the remote file name.

use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::HorizonsConfig;
use crate::dialog::{Abort, DialogueContext, DialogueEngine, Narrow, Stage, StageTable};
use crate::error::{DateField, FailureReason};
use crate::expect::Pattern;
use crate::request::SpkRequest;
use crate::session::SessionClient;

/// Context names used by the dialogue.
pub mod keys {
    /// Osculating element string.
    pub const ELEMENTS: &str = "elements";
    /// Object name.
    pub const OBJECT_NAME: &str = "object_name";
    /// Contact address.
    pub const EMAIL: &str = "email";
    /// Format prompt answer.
    pub const FORMAT_CODE: &str = "format_code";
    /// File suffix of the selected format.
    pub const FORMAT_SUFFIX: &str = "format_suffix";
    /// Span start.
    pub const START: &str = "start";
    /// Span stop.
    pub const STOP: &str = "stop";
    /// Local artifact name, from the caller or derived from the ID.
    pub const LOCAL_FILENAME: &str = "local_filename";
    /// Server-assigned SPK object ID.
    pub const OBJECT_ID: &str = "object_id";
    /// Remote artifact name.
    pub const REMOTE_FILENAME: &str = "remote_filename";
}

const MAIN_PROMPT: &str = "Horizons> ";
const ELEMENTS_PROMPT: &str = r"(?i)elements[^\r\n]*: ";
const INPUT_ERROR: &str = r"(?m)^[^\r\n]*(?:Cannot interpret|ERROR)[^\r\n]*\r?\n";
const FRAME_PROMPT: &str = r"(?i)reference frame[^\r\n]*: ";
const NAME_PROMPT: &str = r"(?i)object name[^\r\n]*: ";
const ACTION_PROMPT: &str = r"(?i)select[^\r\n]*: ";
const OBJECT_ID: &str = r"Assigned SPK object ID:\s*(\S+)\s";
const EMAIL_PROMPT: &str = r"(?i)e-?mail[^\r\n]*: ";
const CONFIRM_PROMPT: &str = r"(?i)\byes\b[^\r\n]*\bno\b[^\r\n]*: ";
const FORMAT_PROMPT: &str = r"(?i)SPK file format[^\r\n]*: ";
const START_PROMPT: &str = r"\bSTART\b[^\r\n]*: ";
const RETRY: &str = r"(?im)^[^\r\n]*\btry again\b[^\r\n]*(?:\r?\n|: )";
const STOP_PROMPT: &str = r"\bSTOP\b[^\r\n]*: ";
const SPAN_TOO_LARGE: &str = r"(?im)^[^\r\n]*\bspan\b[^\r\n]*\btoo (?:large|long)\b[^\r\n]*\r?\n";
const SPAN_TOO_SMALL: &str = r"(?im)^[^\r\n]*\bspan\b[^\r\n]*\btoo (?:small|short)\b[^\r\n]*\r?\n";
const MORE_OBJECTS: &str = r"(?i)more objects[^\r\n]*: ";
const FILE_NAME: &str = r"File name\s*:\s*(\S+)\s";

/// Build the dialogue's stage table.
///
/// Every stage waits at most `stage_timeout` except span validation,
/// which waits `computation_timeout` (or indefinitely).
pub fn stage_table(config: &HorizonsConfig) -> Result<StageTable, regex::Error> {
    let wait = Some(config.stage_timeout);
    let re = Pattern::regex;

    Ok(StageTable::new("horizons")
        .stage(Stage::new("greeting").deadline(wait).expect(MAIN_PROMPT).reply("PAGE"))
        .stage(Stage::new("mode").deadline(wait).expect(MAIN_PROMPT).reply("##2"))
        .stage(Stage::new("commit").deadline(wait).expect(MAIN_PROMPT).reply(";"))
        .stage(
            Stage::new("elements")
                .deadline(wait)
                .expect(re(ELEMENTS_PROMPT)?)
                .reply("${elements}"),
        )
        .stage(
            Stage::new("frame")
                .deadline(wait)
                .error(re(INPUT_ERROR)?, FailureReason::ServerReportedInputError)
                .expect(re(FRAME_PROMPT)?)
                .reply("J2000"),
        )
        .stage(
            Stage::new("name")
                .deadline(wait)
                .expect(re(NAME_PROMPT)?)
                .reply("${object_name}"),
        )
        .stage(Stage::new("action").deadline(wait).expect(re(ACTION_PROMPT)?).reply("S"))
        .stage(
            Stage::new("object id")
                .deadline(wait)
                .unless(keys::LOCAL_FILENAME)
                .expect(re(OBJECT_ID)?)
                .capture(1, keys::OBJECT_ID, Narrow::Integer)
                .derive(keys::LOCAL_FILENAME, "${object_id}.${format_suffix}"),
        )
        .stage(Stage::new("email").deadline(wait).expect(re(EMAIL_PROMPT)?).reply("${email}"))
        .stage(Stage::new("confirm").deadline(wait).expect(re(CONFIRM_PROMPT)?).reply("yes"))
        .stage(
            Stage::new("format")
                .deadline(wait)
                .expect(re(FORMAT_PROMPT)?)
                .reply("${format_code}"),
        )
        .stage(Stage::new("start").deadline(wait).expect(re(START_PROMPT)?).reply("${start}"))
        .stage(
            Stage::new("stop")
                .deadline(wait)
                .error(re(RETRY)?, FailureReason::InvalidDate(DateField::Start))
                .expect(re(STOP_PROMPT)?)
                .reply("${stop}"),
        )
        .stage(
            Stage::new("span")
                .deadline(config.computation_timeout)
                .error(re(SPAN_TOO_LARGE)?, FailureReason::SpanTooLarge)
                .error(re(SPAN_TOO_SMALL)?, FailureReason::SpanTooShort)
                .error(re(RETRY)?, FailureReason::InvalidDate(DateField::Stop))
                .expect(re(MORE_OBJECTS)?)
                .reply("NO"),
        )
        .stage(
            Stage::new("file name")
                .deadline(wait)
                .expect(re(FILE_NAME)?)
                .capture(1, keys::REMOTE_FILENAME, Narrow::Text),
        ))
}

/// Build the initial context for `request`.
#[must_use]
pub fn context(request: &SpkRequest) -> DialogueContext {
    let ctx = DialogueContext::new()
        .with_input(keys::ELEMENTS, request.elements.clone())
        .with_input(keys::OBJECT_NAME, request.object_name.clone())
        .with_input(keys::EMAIL, request.email.clone())
        .with_input(keys::FORMAT_CODE, request.format.code())
        .with_input(keys::FORMAT_SUFFIX, request.format.suffix())
        .with_input(keys::START, request.start.clone())
        .with_input(keys::STOP, request.stop.clone());
    match &request.output {
        Some(path) => ctx.with_input(keys::LOCAL_FILENAME, path.display().to_string()),
        None => ctx,
    }
}

/// What a completed generation dialogue yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    /// Name of the artifact on the file server.
    pub remote_filename: String,
    /// Where the artifact is to be stored locally.
    pub local_filename: PathBuf,
    /// File suffix of the selected format.
    pub format_suffix: String,
    /// Server-assigned object ID, when it was captured.
    pub object_id: Option<u64>,
}

impl Generated {
    /// Extract the result from a completed context.
    #[must_use]
    pub fn from_context(ctx: &DialogueContext) -> Option<Self> {
        Some(Self {
            remote_filename: ctx.get(keys::REMOTE_FILENAME)?,
            local_filename: PathBuf::from(ctx.get(keys::LOCAL_FILENAME)?),
            format_suffix: ctx.get(keys::FORMAT_SUFFIX)?,
            object_id: ctx.get_u64(keys::OBJECT_ID),
        })
    }
}

/// Run the dialogue over an open session. The session is closed on return.
pub async fn run_session<T>(
    session: &mut SessionClient<T>,
    request: &SpkRequest,
    config: &HorizonsConfig,
) -> Result<Generated, Abort>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let table = match stage_table(config) {
        Ok(table) => table,
        Err(e) => {
            session.close().await;
            return Err(Abort::new(FailureReason::Transport, 0).with_diagnostic(e.to_string()));
        }
    };
    let last = table.len().saturating_sub(1);

    let ctx = DialogueEngine::new()
        .run(session, &table, context(request))
        .await
        .into_result()?;
    Generated::from_context(&ctx).ok_or_else(|| Abort::new(FailureReason::MalformedCapture, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SpkFormat;

    fn request() -> SpkRequest {
        SpkRequest {
            format: SpkFormat::Text,
            object_name: "test body".into(),
            start: "2024-01-01".into(),
            stop: "2024-03-01".into(),
            elements: "EC=0.1 QR=1.2".into(),
            email: "observer@example.org".into(),
            output: None,
        }
    }

    #[test]
    fn table_has_fifteen_stages() {
        let table = stage_table(&HorizonsConfig::default()).unwrap();
        assert_eq!(table.len(), 15);
        assert_eq!(table.get(13).unwrap().wait_limit(), None);
        assert_eq!(
            table.get(0).unwrap().wait_limit(),
            Some(HorizonsConfig::default().stage_timeout)
        );
    }

    #[test]
    fn context_carries_format_details() {
        let ctx = context(&request());
        assert_eq!(ctx.input(keys::FORMAT_CODE), Some("A"));
        assert_eq!(ctx.input(keys::FORMAT_SUFFIX), Some("xsp"));
        assert!(!ctx.contains(keys::LOCAL_FILENAME));
    }

    #[test]
    fn override_binds_local_filename() {
        let mut req = request();
        req.output = Some(PathBuf::from("mine.xsp"));
        let ctx = context(&req);
        assert_eq!(ctx.input(keys::LOCAL_FILENAME), Some("mine.xsp"));
    }

    #[test]
    fn prompts_match_their_lines() {
        let cases = [
            (ELEMENTS_PROMPT, "Input small-body elements (EC, QR, ...) : "),
            (FRAME_PROMPT, "Reference frame [J2000/B1950] : "),
            (NAME_PROMPT, "Optional object name : "),
            (ACTION_PROMPT, "Select ... [E]phemeris, [S]PK : "),
            (EMAIL_PROMPT, "Enter your Internet e-mail address : "),
            (CONFIRM_PROMPT, "Confirm e-mail address [yes(<cr>),no] : "),
            (FORMAT_PROMPT, "SPK file format [A]SCII transfer, [B]inary : "),
            (START_PROMPT, "Enter START date (YYYY-MM-DD) : "),
            (STOP_PROMPT, "Enter STOP date (YYYY-MM-DD) : "),
            (MORE_OBJECTS, "Add more objects to file [YES,NO] : "),
        ];
        for (pattern, line) in cases {
            let pattern = Pattern::regex(pattern).unwrap();
            assert!(pattern.matches(line).is_some(), "{pattern:?} vs {line:?}");
        }
    }

    #[test]
    fn span_messages_are_distinguished() {
        let large = Pattern::regex(SPAN_TOO_LARGE).unwrap();
        let small = Pattern::regex(SPAN_TOO_SMALL).unwrap();
        let line = "Time span too short; must be at least 32 days\r\n";
        assert!(small.matches(line).is_some());
        assert!(large.matches(line).is_none());
    }
}
