//! Error taxonomy of the engine.
//!
//! Every failure is scoped to a single command. Submission-time failures
//! (`Argument`, `ConstraintViolation`) go back to the submitter; execution
//! time failures are logged and recorded as events by the scheduler.

use crate::admission::AdmissionDenied;
use crate::command_point::CpPool;
use crate::state::{CityId, GeneralId, NationId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed or out-of-range submitted payload.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgumentError {
    #[error("unknown action '{action}'")]
    UnknownAction { action: String },
    #[error("{action}: missing field '{field}'")]
    MissingField { action: String, field: String },
    #[error("{action}: field '{field}' must be {expected}")]
    WrongType {
        action: String,
        field: String,
        expected: String,
    },
    #[error("{action}: field '{field}' = {value} is outside {min}..={max}")]
    OutOfRange {
        action: String,
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Failure of the storage collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("general {0} not found")]
    GeneralNotFound(GeneralId),
    #[error("city {0} not found")]
    CityNotFound(CityId),
    #[error("nation {0} not found")]
    NationNotFound(NationId),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    Argument(#[from] ArgumentError),
    #[error("{message}")]
    ConstraintViolation { message: String },
    #[error("not enough {pool}: requested {requested}")]
    ResourceExhausted { pool: CpPool, requested: i64 },
    #[error("admission denied: {0}")]
    AdmissionDenied(#[from] AdmissionDenied),
    #[error("persistence: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("command {0} is not queued")]
    NotQueued(u64),
}

impl EngineError {
    pub fn violation(message: impl Into<String>) -> Self {
        EngineError::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Short machine-readable name for event logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Argument(_) => "argument",
            EngineError::ConstraintViolation { .. } => "constraint_violation",
            EngineError::ResourceExhausted { .. } => "resource_exhausted",
            EngineError::AdmissionDenied(_) => "admission_denied",
            EngineError::Persistence(_) => "persistence",
            EngineError::NotQueued(_) => "not_queued",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::Coord;

    #[test]
    fn test_messages_surface_cleanly() {
        let e = EngineError::violation("Not enough gold.");
        assert_eq!(e.to_string(), "Not enough gold.");

        let e: EngineError = ArgumentError::OutOfRange {
            action: "recruit".into(),
            field: "amount".into(),
            value: 5,
            min: 100,
            max: 10_000,
        }
        .into();
        assert_eq!(
            e.to_string(),
            "invalid argument: recruit: field 'amount' = 5 is outside 100..=10000"
        );
        assert_eq!(e.kind(), "argument");
    }

    #[test]
    fn test_admission_converts() {
        let e: EngineError = AdmissionDenied::Impassable {
            coord: Coord::new(1, 1),
        }
        .into();
        assert_eq!(e.kind(), "admission_denied");
        assert!(e.to_string().contains("impassable"));
    }

    #[test]
    fn test_persistence_reported_as_text() {
        let e: EngineError = PersistenceError::GeneralNotFound(7).into();
        assert_eq!(e.kind(), "persistence");
        assert_eq!(e.to_string(), "persistence: general 7 not found");
    }
}
