use std::fmt;

use thiserror::Error;

/// A source row that could not be turned into a station and was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub line: u64,
    pub field: &'static str,
    pub value: String,
    pub reason: String,
}

impl RowIssue {
    pub fn new(
        line: u64,
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            line,
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: {} {:?} {}",
            self.line, self.field, self.value, self.reason
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    #[error("coordinate is empty")]
    Empty,
    #[error("coordinate {0:?} is not a decimal number")]
    NotANumber(String),
    #[error("coordinate {0:?} is out of range")]
    OutOfRange(String),
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("CSV error: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("station header is missing columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<&'static str> },
}

impl From<csv::Error> for ParserError {
    fn from(source: csv::Error) -> Self {
        Self::Csv { source }
    }
}
