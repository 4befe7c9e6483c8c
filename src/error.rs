use std::fmt;

use thiserror::Error;

/// Failure of a single extraction call. Fatal to that source only.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("markup could not be parsed: {0}")]
    Parse(String),
}

/// Non-fatal signal a caller may log and move on from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    NoTableFound,
    MissingIdentifier,
    ImportSourceUnavailable(String),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::NoTableFound => write!(f, "no table found"),
            Condition::MissingIdentifier => write!(f, "record has no usable certificate number"),
            Condition::ImportSourceUnavailable(source) => {
                write!(f, "import source unavailable: {}", source)
            }
        }
    }
}
