//! Domain error types.

use chrono::NaiveDateTime;

/// Top-level error type for orbtrader.
#[derive(Debug, thiserror::Error)]
pub enum OrbtraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no bars in {source_name}")]
    NoData { source_name: String },

    #[error("bars out of order or duplicated at {timestamp}")]
    FeedOrder { timestamp: NaiveDateTime },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OrbtraderError {
    /// Process exit status: 1 I/O and reporting, 2 configuration, 5 data.
    pub fn exit_status(&self) -> u8 {
        match self {
            OrbtraderError::Io(_) | OrbtraderError::Report { .. } => 1,
            OrbtraderError::ConfigParse { .. }
            | OrbtraderError::ConfigMissing { .. }
            | OrbtraderError::ConfigInvalid { .. } => 2,
            OrbtraderError::Data { .. }
            | OrbtraderError::NoData { .. }
            | OrbtraderError::FeedOrder { .. } => 5,
        }
    }
}

impl From<&OrbtraderError> for std::process::ExitCode {
    fn from(err: &OrbtraderError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
