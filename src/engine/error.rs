use std::fmt;

use crate::calendar::ValidationError;
use crate::model::{Proposal, Reservation};
use crate::parser::ParseError;
use crate::store::{CommitError, StorageError};

/// Boundary sum type: everything a caller of the engine can be told.
#[derive(Debug)]
pub enum EngineError {
    Validation(ValidationError),
    /// The requested slot is taken; carries the full conflicting list and
    /// up to three advisory alternatives.
    Conflict {
        existing: Vec<Reservation>,
        alternatives: Vec<Proposal>,
    },
    Parse(ParseError),
    UnknownResource(String),
    Storage(StorageError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(err) => write!(f, "{err}"),
            EngineError::Conflict { existing, alternatives } => write!(
                f,
                "slot conflicts with {} reservation(s), {} alternative(s) available",
                existing.len(),
                alternatives.len()
            ),
            EngineError::Parse(err) => write!(f, "{err}"),
            EngineError::UnknownResource(name) => write!(f, "unknown resource {name:?}"),
            EngineError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Validation(err) => Some(err),
            EngineError::Parse(err) => Some(err),
            EngineError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Validation(err)
    }
}

impl From<ParseError> for EngineError {
    fn from(err: ParseError) -> Self {
        EngineError::Parse(err)
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::Storage(err)
    }
}

impl From<CommitError> for EngineError {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::Validation(err) => EngineError::Validation(err),
            CommitError::Conflict(existing) => EngineError::Conflict {
                existing,
                alternatives: Vec::new(),
            },
            CommitError::UnknownResource(name) => EngineError::UnknownResource(name),
            CommitError::Storage(err) => EngineError::Storage(err),
        }
    }
}
