//! Convenient re-exports for common smb-spk usage.

// Configuration
pub use crate::config::{Config, EnvConfig, LogFormat, LoggingConfig};

// Error handling
pub use crate::error::{ConfigError, FailureReason, SessionError};

// Requests and results
pub use crate::request::{SpkFormat, SpkRequest};
pub use crate::run::{Disposition, execute, run};

// Dialogue building blocks
pub use crate::dialog::{DialogueContext, DialogueEngine, Narrow, Outcome, Stage, StageTable};
pub use crate::expect::{Pattern, PatternKind, PatternSet};
pub use crate::session::SessionClient;
