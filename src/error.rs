use crate::store::StoreError;

/// Errors that end a run. Everything row-scoped is folded into the summary
/// counters instead.
#[derive(Debug)]
pub enum SweepError {
    Config(String),
    CandidateRead(StoreError),
}

impl std::fmt::Display for SweepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepError::Config(msg) => write!(f, "Configuration error: {msg}"),
            SweepError::CandidateRead(err) => write!(f, "Failed to read candidates: {err}"),
        }
    }
}

impl std::error::Error for SweepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SweepError::Config(_) => None,
            SweepError::CandidateRead(err) => Some(err),
        }
    }
}

impl From<StoreError> for SweepError {
    fn from(err: StoreError) -> Self {
        SweepError::CandidateRead(err)
    }
}
