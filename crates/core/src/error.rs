use thiserror::Error;
use uuid::Uuid;

use crate::entity::{DimensionKind, RunStatus};

/// Domain errors surfaced by the store.
///
/// `ReferenceNotFound` means a missing seed row, not a transient
/// condition — callers must not retry it.
#[derive(Error, Debug)]
pub enum GranaryError {
    #[error("unknown {kind} code: {code}")]
    ReferenceNotFound { kind: DimensionKind, code: String },

    #[error("run not found: {0}")]
    RunNotFound(Uuid),

    #[error("run {0} already closed")]
    RunAlreadyClosed(Uuid),

    #[error("close requires a terminal status, got {0}")]
    NonTerminalClose(RunStatus),

    #[error("series not found: {0}")]
    SeriesNotFound(Uuid),

    #[error("observation not found: {0}")]
    ObservationNotFound(Uuid),

    #[error("bronze cell not found: {0}")]
    CellNotFound(Uuid),

    #[error("cannot convert {from} to {to}: {reason}")]
    UnitConversion {
        from: String,
        to: String,
        reason: String,
    },
}

impl GranaryError {
    pub fn reference_not_found(kind: DimensionKind, code: impl Into<String>) -> Self {
        Self::ReferenceNotFound {
            kind,
            code: code.into(),
        }
    }
}
