use serde::Serialize;
use thiserror::Error;

/// A problem with a single footprint or pad record.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum RecordError {
    #[error("missing ({form}) form")]
    MissingForm { form: String },

    #[error("({form}) has no value at index {index}")]
    MissingValue { form: String, index: usize },

    #[error("invalid number {value:?} in ({form})")]
    InvalidNumber { form: String, value: String },

    #[error("pad {name:?}: {source}")]
    Pad {
        name: String,
        #[source]
        source: Box<RecordError>,
    },
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
