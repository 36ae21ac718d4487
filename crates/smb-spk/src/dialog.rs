//! Data-driven dialogues.
//!
//! A dialogue is a [`StageTable`]: an ordered list of expect/respond
//! stages. The [`DialogueEngine`] runs a table over a session client,
//! binding captured values into a [`DialogueContext`] and producing an
//! [`Outcome`].
//!
//! ```rust
//! use std::time::Duration;
//! use smb_spk::dialog::{Narrow, Stage, StageTable};
//! use smb_spk::expect::Pattern;
//!
//! # fn main() -> Result<(), regex::Error> {
//! let table = StageTable::new("example")
//!     .stage(
//!         Stage::new("greeting")
//!             .deadline(Some(Duration::from_secs(30)))
//!             .expect("Horizons> ")
//!             .reply("PAGE"),
//!     )
//!     .stage(
//!         Stage::new("id")
//!             .expect(Pattern::regex(r"object ID:\s*(\S+)\s")?)
//!             .capture(1, "object_id", Narrow::Integer),
//!     );
//! assert_eq!(table.len(), 2);
//! # Ok(())
//! # }
//! ```

mod context;
mod engine;
mod outcome;
mod stage;

pub use context::{DialogueContext, Value};
pub use engine::{DialogueEngine, StageOutcome};
pub use outcome::{Abort, Outcome};
pub use stage::{Arm, Capture, Condition, Narrow, Stage, StageTable, Template};
