use cx_primitives::Height;
use std::fmt::{Display, Formatter};


/// A failed write of one pack to one sink
#[derive(Debug)]
pub struct SinkFailure {
    pub sink: String,
    pub first_height: Height,
    pub last_height: Height,
    pub error: anyhow::Error
}


impl Display for SinkFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed to write blocks {}-{}: {:#}",
            self.sink,
            self.first_height,
            self.last_height,
            self.error
        )
    }
}


#[derive(Debug)]
pub enum ExportError {
    SourceUnavailable {
        reason: anyhow::Error
    },
    FetchFailed {
        height: Height,
        reason: anyhow::Error
    },
    CheckpointUnavailable {
        reason: anyhow::Error
    },
    QueryFailed {
        sink: String,
        reason: anyhow::Error
    },
    WriteFailed(Vec<SinkFailure>)
}


impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::SourceUnavailable { reason } => {
                write!(f, "failed to get current height from the source: {:#}", reason)
            },
            ExportError::FetchFailed { height, reason } => {
                write!(f, "failed to fetch block {}: {:#}", height, reason)
            },
            ExportError::CheckpointUnavailable { reason } => {
                write!(f, "checkpoint is not available: {:#}", reason)
            },
            ExportError::QueryFailed { sink, reason } => {
                write!(f, "checkpoint query to {} failed: {:#}", sink, reason)
            },
            ExportError::WriteFailed(failures) => {
                write!(f, "{} sink write(s) failed", failures.len())?;
                for failure in failures {
                    write!(f, "\n  {}", failure)?;
                }
                Ok(())
            }
        }
    }
}


impl std::error::Error for ExportError {}

